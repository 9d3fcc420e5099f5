// /////////////////////////////////////////////////////////////////////////////
// Upload Engine
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Retry Controller
//!
//! Classifies a failed attempt into a [`RetryVerdict`] and computes the next
//! delay (`spec.md` §4.7). Pure and synchronous: the actual waiting and
//! rescheduling is an infrastructure concern driven off this classification.

use crate::error::UploadError;
use crate::value_objects::RetryVerdict;
use rand::Rng;

pub struct RetryController;

impl RetryController {
    /// Classifies `error` given the attempt count already made for this
    /// chunk (1-based: the attempt that just failed) and the configured
    /// retry budget.
    pub fn classify(error: &UploadError, attempts: u32, retry_budget: u32) -> RetryVerdict {
        if attempts > retry_budget {
            return match error {
                UploadError::Cancelled => RetryVerdict::Terminal,
                _ => RetryVerdict::Fatal,
            };
        }

        match error {
            UploadError::Timeout(_) => RetryVerdict::RetryAfter { delay_ms: 0 },
            UploadError::Network(_) => RetryVerdict::RetryAfterOnline,
            UploadError::ReadError(_) => RetryVerdict::RetryAfter { delay_ms: 0 },
            UploadError::HttpTransient { .. } => RetryVerdict::RetryAfter { delay_ms: 0 },
            UploadError::HttpClient { .. } => RetryVerdict::Fatal,
            UploadError::Authentication(_) => RetryVerdict::Fatal,
            UploadError::Merge(_) => RetryVerdict::RestartFromCheckpoint { delay_ms: 0 },
            UploadError::Cancelled => RetryVerdict::Terminal,
            UploadError::Validation(_)
            | UploadError::QuotaExceeded(_)
            | UploadError::DataCorruption(_)
            | UploadError::Worker(_)
            | UploadError::InvalidChunk(_)
            | UploadError::InvalidConfiguration(_)
            | UploadError::Persistence(_)
            | UploadError::Internal(_) => RetryVerdict::Fatal,
        }
    }

    /// `base · 2^attempt + U[0,1000)` ms, honoring a server `Retry-After`
    /// header (in milliseconds) when present.
    pub fn next_delay_ms(base_delay_ms: u64, attempt: u32, retry_after_ms: Option<u64>) -> u64 {
        if let Some(retry_after) = retry_after_ms {
            return retry_after;
        }
        let exponential = base_delay_ms.saturating_mul(1u64 << attempt.min(20));
        let jitter = rand::rng().random_range(0..1000);
        exponential + jitter
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_is_retryable_within_budget() {
        let verdict = RetryController::classify(&UploadError::Timeout(5_000), 1, 3);
        assert!(verdict.is_retry());
    }

    #[test]
    fn exhausted_budget_becomes_fatal() {
        let verdict = RetryController::classify(&UploadError::Timeout(5_000), 4, 3);
        assert_eq!(verdict, RetryVerdict::Fatal);
    }

    #[test]
    fn http_4xx_other_than_429_is_fatal_immediately() {
        let verdict = RetryController::classify(&UploadError::HttpClient { status: 400, message: "bad".into() }, 1, 3);
        assert_eq!(verdict, RetryVerdict::Fatal);
    }

    #[test]
    fn http_transient_is_retryable() {
        let verdict = RetryController::classify(
            &UploadError::HttpTransient { status: 503, message: "unavailable".into(), retry_after_ms: None },
            1,
            3,
        );
        assert!(verdict.is_retry());
    }

    #[test]
    fn network_error_waits_for_online() {
        let verdict = RetryController::classify(&UploadError::Network("reset".into()), 1, 3);
        assert_eq!(verdict, RetryVerdict::RetryAfterOnline);
    }

    #[test]
    fn read_error_retries_on_ordinary_backoff_not_online_wait() {
        let verdict = RetryController::classify(&UploadError::ReadError("handle closed".into()), 1, 3);
        assert!(matches!(verdict, RetryVerdict::RetryAfter { .. }));
    }

    #[test]
    fn cancellation_is_terminal_even_past_budget() {
        let verdict = RetryController::classify(&UploadError::Cancelled, 10, 3);
        assert_eq!(verdict, RetryVerdict::Terminal);
    }

    #[test]
    fn retry_after_header_overrides_exponential_backoff() {
        let delay = RetryController::next_delay_ms(1_000, 5, Some(42));
        assert_eq!(delay, 42);
    }

    #[test]
    fn exponential_backoff_grows_with_attempt_and_includes_jitter() {
        for attempt in 0..4 {
            let delay = RetryController::next_delay_ms(1_000, attempt, None);
            let base = 1_000u64 * (1u64 << attempt);
            assert!(delay >= base, "attempt={attempt} delay={delay} base={base}");
            assert!(delay < base + 1_000, "attempt={attempt} delay={delay} base={base}");
        }
    }
}
