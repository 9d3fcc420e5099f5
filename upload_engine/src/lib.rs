// /////////////////////////////////////////////////////////////////////////////
// Upload Engine
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

// Production code safety enforced via CI and `make lint-strict`
// (lib/bins checked separately from tests - tests may use unwrap/expect)

//! # Upload Engine
//!
//! The host-facing half of the resumable, chunked upload engine: concrete
//! `HostAdapter`/`ResumeLedger` implementations, the chunk scheduler and
//! network observer runtime, and the application-layer coordinator and
//! batch engine that tie them to `upload_engine_domain`'s pure business
//! logic.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Application Layer                          │
//! │  (UploadCoordinator, UploadEngine, progress/result sinks)    │
//! └─────────────────────────────────────────────────────────────┘
//!                                │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 upload_engine_domain                        │
//! │  (Entities, Value Objects, Domain Services, Ports)           │
//! └─────────────────────────────────────────────────────────────┘
//!                                │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                Infrastructure Layer                         │
//! │  (LocalAdapter, KvStore, ChunkScheduler, NetworkObserver)    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Core Components
//!
//! - `infrastructure::adapters`: `HostAdapter`/`KvStore` implementations and
//!   the async fingerprinting helper that drives the domain's synchronous
//!   hasher from them.
//! - `infrastructure::runtime`: the chunk scheduler, the coalescing resume
//!   ledger, and the network observer sampling loop.
//! - `application`: `UploadCoordinator` (one file's lifecycle) and
//!   `UploadEngine` (the caller-facing batch API).

pub mod application;
pub mod infrastructure;

// Tests are organized as:
// - Unit tests: #[cfg(test)] modules within each source file
// - Integration tests: separate files in tests/ directory

pub use upload_engine_domain::{
    ChunkLayout, ChunkPlan, ChunkSize, ChunkSpec, Concurrency, ConnectionEvent, Direction, FileDescriptor, FileHandle,
    Fingerprint, HashAlgorithm, HashMode, NetworkPrediction, NetworkQualityGrade, NetworkSample, NetworkType,
    QualityTrend, ResumeRecord, RetryVerdict, TaskState, UploadConfig, UploadError, UploadResult, UploadTask,
};

pub use crate::application::{NoOpProgressSink, NoOpResultSink, ProgressSink, ResultSink, UploadCoordinator, UploadEngine, UploadTarget};
