// /////////////////////////////////////////////////////////////////////////////
// Upload Engine
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Upload Coordinator
//!
//! Runs the per-file upload lifecycle (`spec.md` §4.9): fingerprint, consult
//! the ledger, ask the Config Advisor, plan chunks, dispatch through the
//! Task Scheduler with a live quality-change feed, then merge. One
//! coordinator instance handles one file; `application::engine::UploadEngine`
//! fans this out across a batch.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use upload_engine_domain::services::chunk_planner::ChunkPlanner;
use upload_engine_domain::services::config_advisor::{ConfigAdvisor, EnvironmentCapabilities, UploadPriority};
use upload_engine_domain::services::host_adapter::{AbortToken, HostAdapter, HttpMethod, HttpRequest, HttpResponse};
use upload_engine_domain::services::hash_engine::HashRequest;
use upload_engine_domain::services::resume_ledger::ResumeLedger;
use upload_engine_domain::services::retry_controller::RetryController;
use upload_engine_domain::value_objects::{ChunkLayout, ChunkPlan};
use upload_engine_domain::{
    entities::UploadTask, FileDescriptor, Fingerprint, HashAlgorithm, NetworkQualityGrade, UploadConfig, UploadError,
    UploadResult,
};

use crate::application::sinks::{ProgressSink, ResultSink};
use crate::infrastructure::adapters::hashing::compute_fingerprint_cancellable;
use crate::infrastructure::adapters::local_adapter::CancellationAbortToken;
use crate::infrastructure::runtime::observer_loop::NetworkObserver;
use crate::infrastructure::runtime::resume_ledger::CoalescingLedger;
use crate::infrastructure::runtime::scheduler::{ChunkExecutor, ChunkScheduler};

/// Where a file's chunks and merge request go, plus any caller headers
/// carried on every chunk request (`spec.md` §6.2).
#[derive(Debug, Clone)]
pub struct UploadTarget {
    pub url: String,
    pub merge_url: Option<String>,
    pub headers: HashMap<String, String>,
}

impl UploadTarget {
    pub fn new(url: impl Into<String>) -> Self {
        UploadTarget { url: url.into(), merge_url: None, headers: HashMap::new() }
    }

    fn merge_url(&self) -> String {
        self.merge_url.clone().unwrap_or_else(|| format!("{}/complete", self.url))
    }
}

/// Listens for `NetworkObserver` grade transitions and re-asks the Config
/// Advisor, widening or narrowing the scheduler's permit pool to match the
/// new concurrency recommendation (`spec.md` §4.9 step 6). Chunk size is not
/// re-planned: this file's chunk boundaries were fixed when `ChunkPlanner`
/// ran, so only the already-adjustable `activeLimit` can react mid-transfer.
/// Returns the watcher's `JoinHandle`; the caller aborts it once the
/// scheduler drains so it doesn't outlive the file it is watching.
fn spawn_quality_watch(
    observer: Arc<NetworkObserver>,
    permits: Arc<tokio::sync::Semaphore>,
    initial_limit: usize,
    capabilities: EnvironmentCapabilities,
    file_size: u64,
    priority: Option<UploadPriority>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut grade_changes = observer.subscribe();
        let current_limit = AtomicUsize::new(initial_limit);
        loop {
            let grade = match grade_changes.recv().await {
                Ok(grade) => grade,
                Err(_) => return,
            };
            let advised = ConfigAdvisor::advise(capabilities, file_size, priority, Some(grade));
            let new_limit = advised.concurrency.get().max(1);
            let old_limit = current_limit.swap(new_limit, Ordering::SeqCst);
            if new_limit > old_limit {
                permits.add_permits(new_limit - old_limit);
            } else if new_limit < old_limit {
                permits.forget_permits(old_limit - new_limit);
            }
            debug!(?grade, old_limit, new_limit, "adjusted active chunk concurrency for network quality change");
        }
    })
}

/// Throttles progress reporting to at most once per `MIN_INTERVAL`
/// (`spec.md` §4.9: "throttled to ≤ 200ms").
struct ProgressTracker {
    uploaded_bytes: AtomicU64,
    file_size: u64,
    last_emit: StdMutex<Instant>,
}

impl ProgressTracker {
    const MIN_INTERVAL: Duration = Duration::from_millis(200);

    fn new(file_size: u64) -> Self {
        ProgressTracker { uploaded_bytes: AtomicU64::new(0), file_size, last_emit: StdMutex::new(Instant::now()) }
    }

    fn record(&self, chunk_len: u64, file: &FileDescriptor, sink: &dyn ProgressSink) {
        let total = self.uploaded_bytes.fetch_add(chunk_len, Ordering::SeqCst) + chunk_len;
        let mut last_emit = self.last_emit.lock().unwrap();
        if last_emit.elapsed() >= Self::MIN_INTERVAL || total >= self.file_size {
            let fraction = (total as f64 / self.file_size.max(1) as f64).min(1.0);
            sink.on_progress(fraction, file);
            *last_emit = Instant::now();
        }
    }
}

/// Per-chunk upload, bridging the scheduler to `HostAdapter::send_request`,
/// the Retry Controller, and the resume ledger (`spec.md` §4.9 steps 7-8 for
/// a single chunk).
struct HttpChunkExecutor<A: HostAdapter + 'static> {
    adapter: Arc<A>,
    ledger: Arc<CoalescingLedger<A>>,
    handle: upload_engine_domain::FileHandle,
    fingerprint: Fingerprint,
    plan: Arc<ChunkPlan>,
    target: UploadTarget,
    config: Arc<StdMutex<UploadConfig>>,
    session_id: Arc<StdMutex<Option<String>>>,
    progress: Arc<ProgressTracker>,
    progress_sink: Arc<dyn ProgressSink>,
    file: FileDescriptor,
    observer: Option<Arc<NetworkObserver>>,
}

impl<A: HostAdapter + 'static> HttpChunkExecutor<A> {
    fn classify_http_status(response: &HttpResponse) -> UploadError {
        let retry_after_ms = response
            .header("Retry-After")
            .and_then(|v| v.parse::<u64>().ok())
            .map(|secs| secs * 1_000);
        match response.status {
            401 | 403 => UploadError::Authentication(format!("server rejected chunk with status {}", response.status)),
            400 | 422 => UploadError::Validation(format!("server rejected chunk as invalid: {}", response.status)),
            413 => UploadError::InvalidChunk(format!("server reported chunk too large: {}", response.status)),
            429 => UploadError::HttpTransient { status: response.status, message: "rate limited".into(), retry_after_ms },
            500..=599 => UploadError::HttpTransient { status: response.status, message: "server error".into(), retry_after_ms },
            other => UploadError::HttpClient { status: other, message: "chunk upload rejected".into() },
        }
    }
}

#[async_trait]
impl<A: HostAdapter + 'static> ChunkExecutor for HttpChunkExecutor<A> {
    async fn execute(&self, task: &UploadTask, abort: Arc<dyn AbortToken>) -> Result<(), UploadError> {
        if abort.is_cancelled() {
            return Err(UploadError::Cancelled);
        }

        let spec = self
            .plan
            .get(task.index())
            .ok_or_else(|| UploadError::Internal(format!("no chunk spec for index {}", task.index())))?;
        let bytes = self.adapter.read_slice(&self.handle, spec.offset, spec.length).await?;

        let mut headers = self.target.headers.clone();
        headers.insert("X-File-Fingerprint".into(), self.fingerprint.as_key());
        headers.insert("X-Chunk-Index".into(), spec.index.to_string());
        headers.insert("X-Chunk-Count".into(), self.plan.chunk_count().to_string());
        headers.insert("X-Chunk-Size".into(), spec.length.to_string());
        headers.insert("Content-Type".into(), "application/octet-stream".into());
        if let Some(session_id) = self.session_id.lock().unwrap().clone() {
            headers.insert("X-Session-Id".into(), session_id);
        }

        let request = HttpRequest { url: self.target.url.clone(), method: HttpMethod::Post, headers, body: bytes.clone() };
        let result = self.adapter.send_request(request, abort.clone(), None).await;

        let outcome = match result {
            Ok(response) if response.is_success() => self.handle_success(&response, spec.index, spec.length).await,
            Ok(response) => Err(Self::classify_http_status(&response)),
            Err(e) => Err(e),
        };

        if let Err(error) = &outcome {
            self.apply_retry_delay(task, error).await;
        }
        outcome
    }
}

impl<A: HostAdapter + 'static> HttpChunkExecutor<A> {
    async fn handle_success(&self, response: &HttpResponse, chunk_index: u64, chunk_len: u64) -> Result<(), UploadError> {
        #[derive(serde::Deserialize)]
        struct ChunkAck {
            #[serde(default)]
            ok: bool,
            #[serde(default, rename = "sessionId")]
            session_id: Option<String>,
        }
        let ack: ChunkAck = serde_json::from_slice(&response.body)
            .map_err(|e| UploadError::Validation(format!("malformed chunk acknowledgement: {e}")))?;
        if !ack.ok {
            return Err(UploadError::Validation("server reported chunk rejected".into()));
        }
        if let Some(session_id) = ack.session_id {
            *self.session_id.lock().unwrap() = Some(session_id);
        }

        if let Err(e) = self.ledger.mark_uploaded_and_schedule_flush(&self.fingerprint, chunk_index).await {
            warn!(%e, "resume ledger mark_uploaded failed, continuing anyway");
        }
        self.progress.record(chunk_len, &self.file, self.progress_sink.as_ref());
        Ok(())
    }

    /// Sleeps for the Retry Controller's next delay before `execute` returns
    /// its error, so the scheduler's immediate requeue-and-redispatch lands
    /// after backoff instead of hammering the endpoint. Fatal/terminal
    /// verdicts return immediately; the scheduler's own attempt-count check
    /// in `UploadTask::fail_attempt` independently arrives at the same
    /// terminal outcome.
    async fn apply_retry_delay(&self, task: &UploadTask, error: &UploadError) {
        let (retry_budget, base_delay_ms) = {
            let config = self.config.lock().unwrap();
            (config.retry_budget, config.retry_base_delay_ms)
        };
        let verdict = RetryController::classify(error, task.attempts(), retry_budget);
        if !verdict.is_retry() {
            return;
        }
        if verdict.waits_for_online() {
            if let Some(observer) = &self.observer {
                observer.wait_for_online().await;
            }
            let delay_ms = RetryController::next_delay_ms(base_delay_ms, task.attempts(), None);
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            return;
        }
        let retry_after_ms = match error {
            UploadError::HttpTransient { retry_after_ms, .. } => *retry_after_ms,
            _ => None,
        };
        let delay_ms = RetryController::next_delay_ms(base_delay_ms, task.attempts(), retry_after_ms);
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }
}

/// Runs one file through the full lifecycle: fingerprint, ledger consult,
/// advise, plan, dispatch, merge.
pub struct UploadCoordinator<A: HostAdapter + 'static> {
    adapter: Arc<A>,
    ledger: Arc<CoalescingLedger<A>>,
}

impl<A: HostAdapter + 'static> UploadCoordinator<A> {
    pub fn new(adapter: Arc<A>, ledger: Arc<CoalescingLedger<A>>) -> Self {
        UploadCoordinator { adapter, ledger }
    }

    pub async fn upload_file(
        &self,
        file: &FileDescriptor,
        target: &UploadTarget,
        capabilities: EnvironmentCapabilities,
        priority: Option<UploadPriority>,
        latest_quality: Option<NetworkQualityGrade>,
        observer: Option<Arc<NetworkObserver>>,
        progress_sink: Arc<dyn ProgressSink>,
        result_sink: Arc<dyn ResultSink>,
        abort: Arc<dyn AbortToken>,
        pause_gate: Option<Arc<AtomicBool>>,
    ) -> UploadResult<()> {
        let hash_request = HashRequest::by_size_policy(file.size(), HashAlgorithm::Sha256, true);
        let fingerprint = compute_fingerprint_cancellable(
            self.adapter.as_ref(),
            file.handle(),
            file.size(),
            &hash_request,
            Some(&file.metadata_string()),
            abort.clone(),
        )
        .await;
        let fingerprint = match fingerprint {
            Ok(fp) => fp,
            Err(e) => {
                result_sink.on_error(&e, file);
                return Err(e);
            }
        };

        let config = ConfigAdvisor::advise(capabilities, file.size(), priority, latest_quality);
        let bounds = (
            upload_engine_domain::ChunkSize::new(upload_engine_domain::ChunkSize::MIN_SIZE).unwrap(),
            upload_engine_domain::ChunkSize::new(upload_engine_domain::ChunkSize::MAX_SIZE).unwrap(),
        );
        let plan = Arc::new(ChunkPlanner::plan(file.size(), config.chunk_size, bounds.0, bounds.1));
        let layout = ChunkLayout { chunk_size: config.chunk_size.bytes() as u64, chunk_count: plan.chunk_count() };

        let record = match self.ledger.create_or_get(&fingerprint, file.size(), layout).await {
            Ok(r) => r,
            Err(e) => {
                result_sink.on_error(&e, file);
                return Err(e);
            }
        };

        let pending = plan.pending_indices(&record.uploaded_indices);
        debug!(pending = pending.len(), total = plan.chunk_count(), "dispatching chunk plan");
        let tasks: Vec<UploadTask> = pending.into_iter().map(|index| UploadTask::new(fingerprint.clone(), index)).collect();

        if tasks.is_empty() {
            return self.merge(file, target, &fingerprint, &record, &config, result_sink, observer).await;
        }

        let mut scheduler = ChunkScheduler::new(tasks, config.concurrency, config.retry_budget);
        let config_cell = Arc::new(StdMutex::new(config));
        let session_id = Arc::new(StdMutex::new(record.session_id.clone()));
        let progress = Arc::new(ProgressTracker::new(file.size()));

        let executor = Arc::new(HttpChunkExecutor {
            adapter: self.adapter.clone(),
            ledger: self.ledger.clone(),
            handle: file.handle().clone(),
            fingerprint: fingerprint.clone(),
            plan: plan.clone(),
            target: target.clone(),
            config: config_cell,
            session_id,
            progress,
            progress_sink,
            file: file.clone(),
            observer: observer.clone(),
        });

        let observer_for_merge = observer.clone();
        let quality_watch = observer.map(|observer| {
            spawn_quality_watch(observer, scheduler.permits_handle(), scheduler.active_limit(), capabilities, file.size(), priority)
        });

        scheduler.run_until_drained_with_gate(executor, pause_gate).await;
        if let Some(handle) = quality_watch {
            handle.abort();
        }

        let final_record = self.ledger.load(&fingerprint).await?;
        let complete = final_record.as_ref().map(|r| r.is_complete()).unwrap_or(false);
        if !complete {
            let error = UploadError::Internal("upload did not complete: one or more chunks exhausted their retry budget".into());
            result_sink.on_error(&error, file);
            return Err(error);
        }

        let config = *executor.config.lock().unwrap();
        self.merge(file, target, &fingerprint, final_record.as_ref().unwrap(), &config, result_sink, observer_for_merge).await
    }

    async fn merge(
        &self,
        file: &FileDescriptor,
        target: &UploadTarget,
        fingerprint: &Fingerprint,
        record: &upload_engine_domain::ResumeRecord,
        config: &UploadConfig,
        result_sink: Arc<dyn ResultSink>,
        observer: Option<Arc<NetworkObserver>>,
    ) -> UploadResult<()> {
        self.ledger.flush(fingerprint).await?;

        let body = serde_json::json!({
            "fingerprint": fingerprint.as_key(),
            "filename": file.name(),
            "size": file.size(),
            "chunkCount": record.chunk_layout.chunk_count,
            "sessionId": record.session_id,
        });
        let request = HttpRequest {
            url: target.merge_url(),
            method: HttpMethod::Post,
            headers: {
                let mut h = target.headers.clone();
                h.insert("Content-Type".into(), "application/json".into());
                h
            },
            body: serde_json::to_vec(&body).map_err(|e| UploadError::Internal(format!("failed to serialize merge request: {e}")))?,
        };

        let mut attempt: u32 = 1;
        loop {
            let abort = Arc::new(CancellationAbortToken::new());
            let result = self.adapter.send_request(request.clone(), abort as Arc<dyn AbortToken>, None).await;
            match result {
                Ok(response) if response.is_success() => {
                    self.ledger.clear(fingerprint).await?;
                    let payload: serde_json::Value = serde_json::from_slice(&response.body).unwrap_or(serde_json::Value::Null);
                    result_sink.on_success(payload, file);
                    info!(fingerprint = %fingerprint.as_key(), "merge succeeded");
                    return Ok(());
                }
                Ok(response) => {
                    let error = HttpChunkExecutor::<A>::classify_http_status(&response);
                    let verdict = RetryController::classify(&error, attempt, config.retry_budget);
                    if !verdict.is_retry() {
                        result_sink.on_error(&error, file);
                        return Err(error);
                    }
                    if verdict.waits_for_online() {
                        if let Some(observer) = &observer {
                            observer.wait_for_online().await;
                        }
                    }
                    let retry_after_ms = match &error {
                        UploadError::HttpTransient { retry_after_ms, .. } => *retry_after_ms,
                        _ => None,
                    };
                    let delay = RetryController::next_delay_ms(config.retry_base_delay_ms, attempt, retry_after_ms);
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    attempt += 1;
                }
                Err(error) => {
                    let verdict = RetryController::classify(&error, attempt, config.retry_budget);
                    if !verdict.is_retry() {
                        result_sink.on_error(&error, file);
                        return Err(error);
                    }
                    if verdict.waits_for_online() {
                        if let Some(observer) = &observer {
                            observer.wait_for_online().await;
                        }
                    }
                    let delay = RetryController::next_delay_ms(config.retry_base_delay_ms, attempt, None);
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    attempt += 1;
                }
            }
        }
    }
}
