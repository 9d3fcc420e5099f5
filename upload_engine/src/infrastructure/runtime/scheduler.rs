// /////////////////////////////////////////////////////////////////////////////
// Upload Engine
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Chunk Scheduler
//!
//! Bounded concurrent dispatch of a file's chunk uploads (`spec.md` §4.8).
//! Holds a FIFO ready queue (retries pushed to the front), a running set
//! keyed by chunk index, and an adjustable `activeLimit` enforced with a
//! `tokio::sync::Semaphore` — the same two-level shape the teacher's
//! `GlobalResourceManager` uses for CPU/IO tokens, scoped here to a single
//! file instead of the whole process.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, warn};
use upload_engine_domain::entities::{TaskState, UploadTask};
use upload_engine_domain::services::host_adapter::AbortToken;
use upload_engine_domain::value_objects::Concurrency;
use upload_engine_domain::UploadError;

use crate::infrastructure::adapters::local_adapter::CancellationAbortToken;

/// A single chunk upload, invoked by the scheduler once a slot frees up.
/// Implementations perform the read/HTTP-send/ledger-update steps of the
/// coordinator's per-chunk lifecycle and report the outcome back.
#[async_trait]
pub trait ChunkExecutor: Send + Sync {
    async fn execute(&self, task: &UploadTask, abort: Arc<dyn AbortToken>) -> Result<(), UploadError>;
}

enum Completion {
    Success(UploadTask),
    Failure(UploadTask, UploadError),
}

/// Governs chunk dispatch for one file. Not `Clone`: owned and driven by a
/// single coordinator task per upload.
pub struct ChunkScheduler {
    ready: VecDeque<UploadTask>,
    running: HashMap<u64, Arc<CancellationAbortToken>>,
    permits: Arc<Semaphore>,
    active_limit: usize,
    retry_budget: u32,
    paused: bool,
    stop_in_flight: bool,
}

impl ChunkScheduler {
    pub fn new(tasks: Vec<UploadTask>, concurrency: Concurrency, retry_budget: u32) -> Self {
        let active_limit = concurrency.get().max(1);
        ChunkScheduler {
            ready: tasks.into_iter().collect(),
            running: HashMap::new(),
            permits: Arc::new(Semaphore::new(active_limit)),
            active_limit,
            retry_budget,
            paused: false,
            stop_in_flight: false,
        }
    }

    pub fn is_drained(&self) -> bool {
        self.ready.is_empty() && self.running.is_empty()
    }

    /// The current permit count, for callers that want to adjust
    /// concurrency mid-drain without holding `&mut self` (a quality-change
    /// watcher running alongside `run_until_drained`, for instance).
    pub fn active_limit(&self) -> usize {
        self.active_limit
    }

    /// A clone of the permit pool. `Semaphore::add_permits`/`forget_permits`
    /// both take `&self`, so a caller holding this handle can widen or
    /// narrow the active window without needing mutable access to the
    /// scheduler itself.
    pub fn permits_handle(&self) -> Arc<Semaphore> {
        self.permits.clone()
    }

    /// `pending|running → paused` for every task. `stop_in_flight` decides
    /// whether running chunks are aborted or allowed to finish in place.
    pub fn pause(&mut self, stop_in_flight: bool) {
        self.paused = true;
        self.stop_in_flight = stop_in_flight;
        if stop_in_flight {
            for token in self.running.values() {
                token.cancel();
            }
        }
        for task in self.ready.iter_mut() {
            task.pause();
        }
    }

    /// `paused → pending` for queued tasks; dispatch resumes on the next
    /// `run_until_drained` call.
    pub fn resume(&mut self) {
        self.paused = false;
        for task in self.ready.iter_mut() {
            task.resume();
        }
    }

    /// Cancels every queued and in-flight task. Cancellation is terminal
    /// from any state, so no task re-enters the ready queue afterward.
    pub fn cancel(&mut self) {
        for token in self.running.values() {
            token.cancel();
        }
        for task in self.ready.iter_mut() {
            task.cancel();
        }
    }

    /// Adjusts `activeLimit`. Shrinking never aborts in-flight work: it
    /// simply withholds permits until the running count drops to the new
    /// limit on its own.
    pub fn adjust_concurrency(&mut self, concurrency: Concurrency) {
        let new_limit = concurrency.get().max(1);
        if new_limit > self.active_limit {
            self.permits.add_permits(new_limit - self.active_limit);
        } else if new_limit < self.active_limit {
            self.permits.forget_permits(self.active_limit - new_limit);
        }
        self.active_limit = new_limit;
    }

    /// Runs the dispatch loop until the ready queue and running set are both
    /// empty, or every remaining task has reached a terminal state.
    pub async fn run_until_drained<E: ChunkExecutor + 'static>(&mut self, executor: Arc<E>) {
        self.run_until_drained_with_gate(executor, None).await;
    }

    /// Like `run_until_drained`, but also polls an external pause flag on
    /// every dispatch pass. Lets a caller outside the coordinator (the
    /// engine's batch `pause()`/`resume()`) stop new chunk dispatch for a
    /// file already in flight, not just files still in the queue. Already
    /// running chunks finish normally; only the next `next_dispatchable`
    /// pull is gated.
    pub async fn run_until_drained_with_gate<E: ChunkExecutor + 'static>(&mut self, executor: Arc<E>, pause_gate: Option<Arc<AtomicBool>>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<Completion>();
        let externally_paused = || pause_gate.as_ref().map(|g| g.load(Ordering::SeqCst)).unwrap_or(false);

        loop {
            while !self.paused && !externally_paused() {
                let Some(mut task) = self.next_dispatchable() else { break };
                let Ok(permit) = self.permits.clone().try_acquire_owned() else { break };

                let index = task.index();
                let abort = Arc::new(CancellationAbortToken::new());
                self.running.insert(index, abort.clone());
                task.start(chrono::Utc::now());

                let executor = executor.clone();
                let tx = tx.clone();
                tokio::spawn(async move {
                    let result = executor.execute(&task, abort.clone() as Arc<dyn AbortToken>).await;
                    drop(permit);
                    match result {
                        Ok(()) => {
                            task.complete(chrono::Utc::now());
                            let _ = tx.send(Completion::Success(task));
                        }
                        Err(e) => {
                            let _ = tx.send(Completion::Failure(task, e));
                        }
                    }
                });
            }

            if self.ready.is_empty() && self.running.is_empty() {
                return;
            }

            if self.running.is_empty() && (self.paused || externally_paused()) {
                tokio::time::sleep(Duration::from_millis(50)).await;
                continue;
            }

            match rx.recv().await {
                Some(Completion::Success(task)) => {
                    debug!(chunk_index = task.index(), "chunk upload completed");
                    self.running.remove(&task.index());
                }
                Some(Completion::Failure(mut task, error)) => {
                    warn!(chunk_index = task.index(), attempts = task.attempts(), %error, "chunk upload failed");
                    self.running.remove(&task.index());
                    task.fail_attempt(error, self.retry_budget);
                    if matches!(task.state(), TaskState::Pending) {
                        self.ready.push_front(task);
                    }
                }
                None => return,
            }
        }
    }

    fn next_dispatchable(&mut self) -> Option<UploadTask> {
        let pos = self.ready.iter().position(|t| matches!(t.state(), TaskState::Pending))?;
        self.ready.remove(pos)
    }
}
