// /////////////////////////////////////////////////////////////////////////////
// Upload Engine
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Domain Error Taxonomy
//!
//! A single hierarchical error type for the upload engine, in the shape of
//! the taxonomy required by the upload pipeline: network failures, timeouts,
//! transient vs. fatal HTTP responses, authentication, validation, quota,
//! merge, corruption, worker, and cancellation.
//!
//! Each variant carries enough context to drive the Retry Controller's
//! classification (`crate::services::retry_controller`) without the error
//! type itself knowing about retries.

use thiserror::Error;

/// Domain-specific errors for the upload engine.
#[derive(Error, Debug, Clone)]
pub enum UploadError {
    /// Connection refused, DNS failure, reset, or the adapter reports
    /// offline. Retryable; the Retry Controller waits for an `online` event.
    #[error("network error: {0}")]
    Network(String),

    /// Local I/O failure reading the source file (permission revoked,
    /// handle closed, disk error). Distinct from `Network`: waiting for
    /// connectivity to return can never fix a bad local file handle.
    #[error("read error: {0}")]
    ReadError(String),

    /// A request exceeded its configured timeout. Retryable with backoff.
    #[error("timeout after {0}ms")]
    Timeout(u64),

    /// HTTP 5xx, 408, or 429. Retryable; honors `Retry-After` if present.
    #[error("transient HTTP status {status}: {message}")]
    HttpTransient { status: u16, message: String, retry_after_ms: Option<u64> },

    /// HTTP 4xx other than 429. Fatal for the file.
    #[error("client HTTP status {status}: {message}")]
    HttpClient { status: u16, message: String },

    /// Authentication failed. Fatal, surfaced immediately.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Size/type/extension validation failed before upload began. Fatal.
    #[error("validation failed: {0}")]
    Validation(String),

    /// KV storage quota exceeded. Non-fatal for the upload; the ledger
    /// degrades and this is logged as a warning.
    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    /// Server-side chunk combination failed. Retryable a bounded number of
    /// times, then fatal.
    #[error("merge failed: {0}")]
    Merge(String),

    /// Server reported a checksum mismatch. The file restarts with a forced
    /// full hash.
    #[error("data corruption detected: {0}")]
    DataCorruption(String),

    /// Worker-offloaded hashing failed; falls back to the main-thread path.
    #[error("worker error: {0}")]
    Worker(String),

    /// The chunk has no data, or data violates a structural invariant.
    #[error("invalid chunk: {0}")]
    InvalidChunk(String),

    /// A value object was constructed with an out-of-bounds value.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Persisted state (ledger record) failed to (de)serialize or is
    /// internally inconsistent.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Operation was cancelled. Terminal, not surfaced via `onError`.
    #[error("cancelled")]
    Cancelled,

    /// Catch-all for unexpected internal failures.
    #[error("internal error: {0}")]
    Internal(String),
}

impl UploadError {
    /// Whether the Retry Controller should ever consider retrying this kind
    /// of failure (ignoring budget exhaustion).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            UploadError::Network(_)
                | UploadError::ReadError(_)
                | UploadError::Timeout(_)
                | UploadError::HttpTransient { .. }
                | UploadError::Merge(_)
        )
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, UploadError::Cancelled)
    }

    /// Short machine-readable category, used for structured logging.
    pub fn category(&self) -> &'static str {
        match self {
            UploadError::Network(_) => "network",
            UploadError::ReadError(_) => "read_error",
            UploadError::Timeout(_) => "timeout",
            UploadError::HttpTransient { .. } => "http_transient",
            UploadError::HttpClient { .. } => "http_client",
            UploadError::Authentication(_) => "authentication",
            UploadError::Validation(_) => "validation",
            UploadError::QuotaExceeded(_) => "quota",
            UploadError::Merge(_) => "merge",
            UploadError::DataCorruption(_) => "corruption",
            UploadError::Worker(_) => "worker",
            UploadError::InvalidChunk(_) => "chunk",
            UploadError::InvalidConfiguration(_) => "configuration",
            UploadError::Persistence(_) => "persistence",
            UploadError::Cancelled => "cancelled",
            UploadError::Internal(_) => "internal",
        }
    }
}

impl From<std::io::Error> for UploadError {
    fn from(err: std::io::Error) -> Self {
        UploadError::ReadError(err.to_string())
    }
}

impl From<serde_json::Error> for UploadError {
    fn from(err: serde_json::Error) -> Self {
        UploadError::Persistence(err.to_string())
    }
}

/// Convenience alias used throughout the domain and infrastructure layers.
pub type UploadResult<T> = Result<T, UploadError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_kinds_match_spec_taxonomy() {
        assert!(UploadError::Network("x".into()).is_retryable());
        assert!(UploadError::Timeout(1000).is_retryable());
        assert!(UploadError::HttpTransient { status: 503, message: "x".into(), retry_after_ms: None }.is_retryable());
        assert!(UploadError::Merge("x".into()).is_retryable());
    }

    #[test]
    fn fatal_kinds_are_not_retryable() {
        assert!(!UploadError::HttpClient { status: 400, message: "x".into() }.is_retryable());
        assert!(!UploadError::Authentication("x".into()).is_retryable());
        assert!(!UploadError::Validation("x".into()).is_retryable());
    }

    #[test]
    fn cancelled_is_terminal_not_retryable() {
        let err = UploadError::Cancelled;
        assert!(err.is_cancelled());
        assert!(!err.is_retryable());
    }

    #[test]
    fn io_errors_convert_to_read_error_not_network() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: UploadError = io_err.into();
        assert!(matches!(err, UploadError::ReadError(_)));
        assert!(err.is_retryable());
    }
}
