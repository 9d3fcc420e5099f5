// /////////////////////////////////////////////////////////////////////////////
// Upload Engine
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Upload Engine
//!
//! The caller-facing batch API (`spec.md` §6.4): `add_files`/`start`/
//! `pause`/`resume`/`cancel`, fanning `UploadCoordinator` out across a queue
//! of files with a bounded number running at once, and aggregating results
//! into the final `on_complete(successful, failed)` callback.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::Semaphore;
use tracing::warn;

use upload_engine_domain::services::config_advisor::EnvironmentCapabilities;
use upload_engine_domain::services::host_adapter::{AbortToken, HostAdapter};
use upload_engine_domain::{ConnectionEvent, FileDescriptor, FileHandle, NetworkSample, NetworkType};

use crate::application::coordinator::{UploadCoordinator, UploadTarget};
use crate::application::sinks::{ProgressSink, ResultSink};
use crate::infrastructure::adapters::local_adapter::CancellationAbortToken;
use crate::infrastructure::runtime::observer_loop::NetworkObserver;
use crate::infrastructure::runtime::resume_ledger::CoalescingLedger;

/// How many files the engine drives concurrently. Each file's own chunk
/// concurrency is governed separately by the Config Advisor's per-file
/// `Concurrency` value; this bound only caps how many `UploadCoordinator`
/// runs are in flight at once.
const MAX_PARALLEL_FILES: usize = 3;

/// Fans a batch of files out across `UploadCoordinator`. Owns the queue of
/// files added via `add_files` and the bookkeeping needed to pause, resume,
/// or cancel them.
pub struct UploadEngine<A: HostAdapter + 'static> {
    coordinator: Arc<UploadCoordinator<A>>,
    target: UploadTarget,
    capabilities: EnvironmentCapabilities,
    progress_sink: Arc<dyn ProgressSink>,
    result_sink: Arc<dyn ResultSink>,
    queue: StdMutex<Vec<FileDescriptor>>,
    running: StdMutex<HashMap<FileHandle, Arc<CancellationAbortToken>>>,
    paused: Arc<AtomicBool>,
    observer: Arc<NetworkObserver>,
}

impl<A: HostAdapter + 'static> UploadEngine<A> {
    pub fn new(
        adapter: Arc<A>,
        ledger: Arc<CoalescingLedger<A>>,
        target: UploadTarget,
        capabilities: EnvironmentCapabilities,
        progress_sink: Arc<dyn ProgressSink>,
        result_sink: Arc<dyn ResultSink>,
    ) -> Self {
        UploadEngine {
            coordinator: Arc::new(UploadCoordinator::new(adapter, ledger)),
            target,
            capabilities,
            progress_sink,
            result_sink,
            queue: StdMutex::new(Vec::new()),
            running: StdMutex::new(HashMap::new()),
            paused: Arc::new(AtomicBool::new(false)),
            observer: Arc::new(NetworkObserver::new(NetworkType::Unknown)),
        }
    }

    /// Feeds a throughput/latency sample to the network quality observer.
    /// Hosts that can measure real transfer speed (vs. relying solely on the
    /// per-chunk HTTP round trips) call this to keep grade estimates fresh.
    pub fn record_network_sample(&self, sample: NetworkSample) {
        self.observer.record_sample(sample);
    }

    /// Records a connection lifecycle event (reconnect, handoff between
    /// network types, etc.) that should reset the Quality Evaluator's
    /// rolling window.
    pub fn record_network_event(&self, event: ConnectionEvent) {
        self.observer.record_event(event);
    }

    /// Tells the observer which network type is active, e.g. after the host
    /// detects a Wi-Fi to cellular handoff.
    pub fn set_network_type(&self, network_type: NetworkType) {
        self.observer.set_network_type(network_type);
    }

    /// Queues files for upload. Has no effect on files already running.
    pub fn add_files(&self, files: Vec<FileDescriptor>) {
        self.queue.lock().unwrap().extend(files);
    }

    /// Drains the queue, running up to [`MAX_PARALLEL_FILES`] coordinators
    /// at once. New files wait to start while the engine is paused; files
    /// already dispatched before `pause()` run to their own completion.
    pub async fn start(&self) {
        let files: Vec<FileDescriptor> = std::mem::take(&mut *self.queue.lock().unwrap());
        let permits = Arc::new(Semaphore::new(MAX_PARALLEL_FILES));
        let mut handles = Vec::new();
        let sampling_loop = self.observer.clone().spawn_sampling_loop(
            crate::infrastructure::runtime::observer_loop::DEFAULT_SAMPLE_INTERVAL,
            || (None, 0.0),
        );

        for file in files {
            while self.paused.load(Ordering::SeqCst) {
                tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            }

            let abort = Arc::new(CancellationAbortToken::new());
            self.running.lock().unwrap().insert(file.handle().clone(), abort.clone());

            let coordinator = self.coordinator.clone();
            let target = self.target.clone();
            let capabilities = self.capabilities;
            let progress_sink = self.progress_sink.clone();
            let result_sink = self.result_sink.clone();
            let permits = permits.clone();
            let observer = self.observer.clone();
            let initial_quality = observer.current_grade(None, 0.0);
            let pause_gate = self.paused.clone();

            handles.push(tokio::spawn(async move {
                let _permit = permits.acquire_owned().await.expect("semaphore never closed");
                let outcome = coordinator
                    .upload_file(
                        &file,
                        &target,
                        capabilities,
                        None,
                        Some(initial_quality),
                        Some(observer),
                        progress_sink,
                        result_sink,
                        abort as Arc<dyn AbortToken>,
                        Some(pause_gate),
                    )
                    .await;
                (file, outcome.is_ok())
            }));
        }

        let mut successful = Vec::new();
        let mut failed = Vec::new();
        for handle in handles {
            match handle.await {
                Ok((file, true)) => {
                    self.running.lock().unwrap().remove(file.handle());
                    successful.push(file);
                }
                Ok((file, false)) => {
                    self.running.lock().unwrap().remove(file.handle());
                    failed.push(file);
                }
                Err(e) => warn!(%e, "a file upload task panicked"),
            }
        }
        sampling_loop.abort();
        self.result_sink.on_complete(&successful, &failed);
    }

    /// Stops dispatching new files from the queue and, via the shared
    /// `pause_gate` handed to each running `UploadCoordinator`, also stops
    /// new chunk dispatch for files already in flight. Chunks already
    /// sent keep running to completion; only the next pull from a file's
    /// `ChunkScheduler` ready queue is held back until `resume()`.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    /// Cancels one running file, or every running file when `file` is
    /// `None`.
    pub fn cancel(&self, file: Option<&FileHandle>) {
        let running = self.running.lock().unwrap();
        match file {
            Some(handle) => {
                if let Some(token) = running.get(handle) {
                    token.cancel();
                }
            }
            None => {
                for token in running.values() {
                    token.cancel();
                }
            }
        }
    }
}
