// /////////////////////////////////////////////////////////////////////////////
// Upload Engine
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! One chunk's work item, owned exclusively by the Upload Coordinator for
//! its file (`spec.md` §3, §4.8).

use crate::error::UploadError;
use crate::value_objects::Fingerprint;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
    Paused,
}

#[derive(Debug, Clone)]
pub struct UploadTask {
    fingerprint: Fingerprint,
    index: u64,
    state: TaskState,
    attempts: u32,
    last_error: Option<UploadError>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

impl UploadTask {
    pub fn new(fingerprint: Fingerprint, index: u64) -> Self {
        UploadTask {
            fingerprint,
            index,
            state: TaskState::Pending,
            attempts: 0,
            last_error: None,
            started_at: None,
            completed_at: None,
        }
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn last_error(&self) -> Option<&UploadError> {
        self.last_error.as_ref()
    }

    /// `pending|paused → running`. Bumps the attempt counter and records
    /// `startedAt` on the first dispatch.
    pub fn start(&mut self, now: DateTime<Utc>) {
        debug_assert!(matches!(self.state, TaskState::Pending));
        self.state = TaskState::Running;
        self.attempts += 1;
        if self.started_at.is_none() {
            self.started_at = Some(now);
        }
    }

    /// `running → completed`.
    pub fn complete(&mut self, now: DateTime<Utc>) {
        debug_assert!(matches!(self.state, TaskState::Running));
        self.state = TaskState::Completed;
        self.completed_at = Some(now);
    }

    /// `running → pending` (attempt consumed, retry scheduled) or
    /// `running → failed` when the retry budget is exhausted.
    pub fn fail_attempt(&mut self, error: UploadError, retry_budget: u32) {
        debug_assert!(matches!(self.state, TaskState::Running));
        self.last_error = Some(error);
        if self.attempts > retry_budget {
            self.state = TaskState::Failed;
        } else {
            self.state = TaskState::Pending;
        }
    }

    /// `pending|running → paused`.
    pub fn pause(&mut self) {
        if matches!(self.state, TaskState::Pending | TaskState::Running) {
            self.state = TaskState::Paused;
        }
    }

    /// `paused → pending`.
    pub fn resume(&mut self) {
        if matches!(self.state, TaskState::Paused) {
            self.state = TaskState::Pending;
        }
    }

    /// `any → cancelled`, the one transition with no source-state guard.
    pub fn cancel(&mut self) {
        self.state = TaskState::Cancelled;
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.state, TaskState::Completed | TaskState::Failed | TaskState::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value_objects::HashAlgorithm;

    fn task() -> UploadTask {
        UploadTask::new(Fingerprint::new(HashAlgorithm::Sha256, "abc", None), 0)
    }

    #[test]
    fn happy_path_transitions_to_completed() {
        let mut t = task();
        t.start(Utc::now());
        assert_eq!(t.state(), TaskState::Running);
        t.complete(Utc::now());
        assert_eq!(t.state(), TaskState::Completed);
        assert!(t.is_terminal());
    }

    #[test]
    fn exhausted_budget_transitions_to_failed() {
        let mut t = task();
        for _ in 0..=3 {
            t.start(Utc::now());
            t.fail_attempt(UploadError::Timeout(5_000), 3);
            if !t.is_terminal() {
                t.resume_from_pending_for_test();
            }
        }
        assert_eq!(t.state(), TaskState::Failed);
        assert_eq!(t.attempts(), 4);
    }

    #[test]
    fn pause_then_resume_returns_to_pending() {
        let mut t = task();
        t.pause();
        assert_eq!(t.state(), TaskState::Paused);
        t.resume();
        assert_eq!(t.state(), TaskState::Pending);
    }

    #[test]
    fn cancel_is_terminal_from_any_state() {
        let mut t = task();
        t.start(Utc::now());
        t.cancel();
        assert_eq!(t.state(), TaskState::Cancelled);
        assert!(t.is_terminal());
    }

    impl UploadTask {
        // Test-only helper: `fail_attempt` leaves the task `Pending` when
        // retries remain, so the scheduler loop can re-dispatch without a
        // distinct state name. This mirrors that for the retry-loop test.
        fn resume_from_pending_for_test(&mut self) {
            debug_assert!(matches!(self.state, TaskState::Pending));
        }
    }
}
