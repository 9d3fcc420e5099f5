// /////////////////////////////////////////////////////////////////////////////
// Upload Engine
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Upload Engine Domain
//!
//! The core business logic of the resumable, chunked upload engine. This
//! crate is independent of any host environment: it never touches a file
//! system, network socket, or UI framework directly.
//!
//! ## Module Structure
//!
//! ### Entities
//! Objects with identity and lifecycle that persists through state changes.
//!
//! - `UploadTask`: one chunk's work item, moving through
//!   pending/running/completed/failed/paused/cancelled.
//!
//! ### Value Objects
//! Immutable, self-validating objects defined entirely by their attributes.
//!
//! - `FileDescriptor`, `Fingerprint`, `ChunkSize`, `ChunkPlan`, `Concurrency`,
//!   `UploadConfig`, `RetryVerdict`, `ResumeRecord`, `NetworkSample`,
//!   `NetworkQualityGrade`.
//!
//! ### Domain Services
//! Stateless algorithms, plus the two infrastructure ports
//! (`HostAdapter`, `ResumeLedger`) that are async because they are
//! fundamentally I/O-bound, not CPU-bound business logic.
//!
//! - `ChunkPlanner`: pure file-size → chunk-layout mapping.
//! - `ConfigAdvisor`: pure observation → tuning-config mapping.
//! - `RetryController`: pure error → retry-verdict classification.
//! - `NetworkObserverState`: pure ring-buffer state and quality scoring.
//! - `StreamingHasher` / `hash_engine`: incremental content hashing.
//! - `HostAdapter`: host-environment port (file slicing, HTTP, KV, timers).
//! - `ResumeLedger`: durable fingerprint → uploaded-indices port.
//!
//! ## Error Handling
//!
//! A single hierarchical [`UploadError`] categorizes every failure kind the
//! pipeline can produce, with helper methods the Retry Controller uses to
//! classify them.

pub mod datetime_serde;
pub mod entities;
pub mod error;
pub mod services;
pub mod value_objects;

pub use entities::{TaskState, UploadTask};
pub use error::{UploadError, UploadResult};
pub use value_objects::{
    ChunkLayout, ChunkPlan, ChunkSize, ChunkSpec, Concurrency, ConnectionEvent, Direction, FileDescriptor, FileHandle,
    Fingerprint, HashAlgorithm, HashMode, NetworkPrediction, NetworkQualityGrade, NetworkSample, NetworkType,
    QualityTrend, ResumeRecord, RetryVerdict, UploadConfig,
};
