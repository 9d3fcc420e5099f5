// /////////////////////////////////////////////////////////////////////////////
// Upload Engine
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! The Retry Controller's classification output (`spec.md` §4.7).

/// What the Task Scheduler should do next after a chunk (or merge) attempt
/// fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryVerdict {
    /// Retry after the given delay, counted against the retry budget.
    RetryAfter { delay_ms: u64 },
    /// Retry as soon as the adapter reports connectivity restored, then
    /// apply the usual backoff.
    RetryAfterOnline,
    /// Restart the whole file from its last ledger checkpoint (merge
    /// failure path).
    RestartFromCheckpoint { delay_ms: u64 },
    /// Do not retry; the chunk/file fails.
    Fatal,
    /// Cancellation or abort; not surfaced as an error.
    Terminal,
}

impl RetryVerdict {
    pub fn is_retry(&self) -> bool {
        matches!(
            self,
            RetryVerdict::RetryAfter { .. } | RetryVerdict::RetryAfterOnline | RetryVerdict::RestartFromCheckpoint { .. }
        )
    }

    /// Whether the caller should wait for connectivity to return instead of
    /// sleeping a computed backoff before retrying.
    pub fn waits_for_online(&self) -> bool {
        matches!(self, RetryVerdict::RetryAfterOnline)
    }
}
