// /////////////////////////////////////////////////////////////////////////////
// Upload Engine
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Application Layer
//!
//! Orchestrates the domain services and infrastructure adapters into the
//! caller-facing engine: `UploadCoordinator` runs the per-file lifecycle,
//! `UploadEngine` fans it out across the files a caller adds, and `sinks`
//! holds the callback traits results and progress are reported through.

pub mod coordinator;
pub mod engine;
pub mod sinks;

pub use coordinator::{UploadCoordinator, UploadTarget};
pub use engine::UploadEngine;
pub use sinks::{NoOpResultSink, NoOpProgressSink, ProgressSink, ResultSink};
