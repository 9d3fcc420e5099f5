// /////////////////////////////////////////////////////////////////////////////
// Upload Engine
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Progress and Result Sinks
//!
//! Callback traits for the public caller API (`spec.md` §6.4:
//! `onProgress`/`onSuccess`/`onError`/`onComplete`), grounded in the
//! teacher-adjacent `ProgressCallback` pattern: a plain trait, a no-op
//! implementation, and blanket impls over `Arc`/`Box` so callers can hand
//! the engine either owned sinks or shared ones.

use std::sync::Arc;
use upload_engine_domain::{FileDescriptor, UploadError};

/// Fraction-complete progress for one file, throttled by the coordinator to
/// at most every 200ms (`spec.md` §4.9).
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, fraction: f64, file: &FileDescriptor);
}

/// Terminal outcome callbacks for the overall batch and per-file results.
pub trait ResultSink: Send + Sync {
    fn on_success(&self, response: serde_json::Value, file: &FileDescriptor);
    fn on_error(&self, error: &UploadError, file: &FileDescriptor);
    fn on_complete(&self, successful: &[FileDescriptor], failed: &[FileDescriptor]);
}

pub struct NoOpProgressSink;

impl ProgressSink for NoOpProgressSink {
    fn on_progress(&self, _fraction: f64, _file: &FileDescriptor) {}
}

pub struct NoOpResultSink;

impl ResultSink for NoOpResultSink {
    fn on_success(&self, _response: serde_json::Value, _file: &FileDescriptor) {}
    fn on_error(&self, _error: &UploadError, _file: &FileDescriptor) {}
    fn on_complete(&self, _successful: &[FileDescriptor], _failed: &[FileDescriptor]) {}
}

impl<T: ProgressSink + ?Sized> ProgressSink for Arc<T> {
    fn on_progress(&self, fraction: f64, file: &FileDescriptor) {
        (**self).on_progress(fraction, file)
    }
}

impl<T: ResultSink + ?Sized> ResultSink for Arc<T> {
    fn on_success(&self, response: serde_json::Value, file: &FileDescriptor) {
        (**self).on_success(response, file)
    }
    fn on_error(&self, error: &UploadError, file: &FileDescriptor) {
        (**self).on_error(error, file)
    }
    fn on_complete(&self, successful: &[FileDescriptor], failed: &[FileDescriptor]) {
        (**self).on_complete(successful, failed)
    }
}
