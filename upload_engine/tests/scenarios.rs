//! Integration tests driving `UploadCoordinator`/`UploadEngine` end to end
//! over an in-memory `HostAdapter`, one test per concrete scenario.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;

use upload_engine::infrastructure::adapters::local_adapter::CancellationAbortToken;
use upload_engine::infrastructure::runtime::observer_loop::NetworkObserver;
use upload_engine::infrastructure::runtime::resume_ledger::CoalescingLedger;
use upload_engine::{FileDescriptor, FileHandle, NoOpProgressSink, ResultSink, UploadCoordinator, UploadError, UploadTarget};
use upload_engine_domain::services::config_advisor::{CapabilityGrade, EnvironmentCapabilities, EnvironmentKind};
use upload_engine_domain::services::host_adapter::{AbortToken, AdapterCapabilities, ByteProgressSink, HostAdapter, HttpRequest, HttpResponse, ScheduleHandle};
use upload_engine_domain::value_objects::{ChunkLayout, ConnectionEvent, Direction, NetworkQualityGrade, NetworkSample};

/// In-memory `HostAdapter` standing in for a real file and upload endpoint.
/// Per-chunk-index response queues let a test script a sequence of statuses
/// (e.g. two 503s then a 200) for exactly one chunk while every other chunk
/// succeeds on its first attempt.
struct ScriptedAdapter {
    bytes: Vec<u8>,
    kv: StdMutex<HashMap<String, Vec<u8>>>,
    chunk_url: String,
    merge_url: String,
    chunk_responses: StdMutex<HashMap<u64, VecDeque<u16>>>,
    merge_responses: StdMutex<VecDeque<u16>>,
    chunk_network_failures: StdMutex<HashMap<u64, u32>>,
    chunk_attempts: StdMutex<HashMap<u64, u32>>,
    received_chunks: StdMutex<Vec<u64>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedAdapter {
    fn new(size: u64, chunk_url: impl Into<String>, merge_url: impl Into<String>) -> Self {
        ScriptedAdapter {
            bytes: vec![0xCD; size as usize],
            kv: StdMutex::new(HashMap::new()),
            chunk_url: chunk_url.into(),
            merge_url: merge_url.into(),
            chunk_responses: StdMutex::new(HashMap::new()),
            merge_responses: StdMutex::new(VecDeque::new()),
            chunk_network_failures: StdMutex::new(HashMap::new()),
            chunk_attempts: StdMutex::new(HashMap::new()),
            received_chunks: StdMutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Queues `statuses` for chunk `index`; once exhausted, later attempts
    /// for that chunk succeed with 200.
    fn script_chunk(&self, index: u64, statuses: impl IntoIterator<Item = u16>) {
        self.chunk_responses.lock().unwrap().insert(index, statuses.into_iter().collect());
    }

    /// Makes the first `count` attempts against chunk `index` fail as a
    /// connection-level error (not an HTTP status) rather than a response.
    fn script_chunk_network_error(&self, index: u64, count: u32) {
        self.chunk_network_failures.lock().unwrap().insert(index, count);
    }

    fn script_merge(&self, statuses: impl IntoIterator<Item = u16>) {
        *self.merge_responses.lock().unwrap() = statuses.into_iter().collect();
    }

    fn attempts_for(&self, index: u64) -> u32 {
        *self.chunk_attempts.lock().unwrap().get(&index).unwrap_or(&0)
    }

    fn ok_response(body: &'static [u8]) -> HttpResponse {
        HttpResponse { status: 200, headers: HashMap::new(), body: body.to_vec() }
    }

    fn error_response(status: u16) -> HttpResponse {
        HttpResponse { status, headers: HashMap::new(), body: format!("status {status}").into_bytes() }
    }
}

#[async_trait]
impl HostAdapter for ScriptedAdapter {
    fn capabilities(&self) -> AdapterCapabilities {
        AdapterCapabilities::default()
    }

    async fn read_slice(&self, _handle: &FileHandle, offset: u64, length: u64) -> upload_engine::UploadResult<Vec<u8>> {
        Ok(self.bytes[offset as usize..(offset + length) as usize].to_vec())
    }

    async fn send_request(
        &self,
        request: HttpRequest,
        _abort: Arc<dyn AbortToken>,
        _progress: Option<Arc<dyn ByteProgressSink>>,
    ) -> upload_engine::UploadResult<HttpResponse> {
        if request.url == self.merge_url {
            let status = self.merge_responses.lock().unwrap().pop_front().unwrap_or(200);
            return Ok(if status == 200 { Self::ok_response(br#"{"ok":true}"#) } else { Self::error_response(status) });
        }

        assert_eq!(request.url, self.chunk_url, "unexpected request target");
        let index: u64 = request.headers.get("X-Chunk-Index").and_then(|v| v.parse().ok()).expect("chunk request missing index header");

        let in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(in_flight, Ordering::SeqCst);
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        *self.chunk_attempts.lock().unwrap().entry(index).or_insert(0) += 1;

        let should_fail_network = {
            let mut failures = self.chunk_network_failures.lock().unwrap();
            match failures.get_mut(&index) {
                Some(remaining) if *remaining > 0 => {
                    *remaining -= 1;
                    true
                }
                _ => false,
            }
        };
        if should_fail_network {
            return Err(UploadError::Network("simulated connection reset".into()));
        }

        let status = self.chunk_responses.lock().unwrap().get_mut(&index).and_then(|q| q.pop_front()).unwrap_or(200);
        if status != 200 {
            return Ok(Self::error_response(status));
        }
        self.received_chunks.lock().unwrap().push(index);
        Ok(Self::ok_response(br#"{"ok":true,"sessionId":"s1"}"#))
    }

    async fn kv_get(&self, key: &str) -> upload_engine::UploadResult<Option<Vec<u8>>> {
        Ok(self.kv.lock().unwrap().get(key).cloned())
    }

    async fn kv_put(&self, key: &str, value: Vec<u8>) -> upload_engine::UploadResult<()> {
        self.kv.lock().unwrap().insert(key.to_string(), value);
        Ok(())
    }

    async fn kv_delete(&self, key: &str) -> upload_engine::UploadResult<()> {
        self.kv.lock().unwrap().remove(key);
        Ok(())
    }

    async fn kv_keys(&self, prefix: &str) -> upload_engine::UploadResult<Vec<String>> {
        Ok(self.kv.lock().unwrap().keys().filter(|k| k.starts_with(prefix)).cloned().collect())
    }

    async fn schedule_after(&self, _ms: u64) -> Arc<dyn ScheduleHandle> {
        unimplemented!("not exercised by the coordinator, which uses tokio::time::sleep directly")
    }
}

#[derive(Default)]
struct CapturingResultSink {
    successes: StdMutex<Vec<String>>,
    errors: StdMutex<Vec<(String, UploadError)>>,
    progress_fractions: StdMutex<Vec<f64>>,
}

impl ResultSink for CapturingResultSink {
    fn on_success(&self, _response: serde_json::Value, file: &FileDescriptor) {
        self.successes.lock().unwrap().push(file.name().to_string());
    }
    fn on_error(&self, error: &UploadError, file: &FileDescriptor) {
        self.errors.lock().unwrap().push((file.name().to_string(), error.clone()));
    }
    fn on_complete(&self, _successful: &[FileDescriptor], _failed: &[FileDescriptor]) {}
}

struct CapturingProgressSink {
    fractions: StdMutex<Vec<f64>>,
}

impl CapturingProgressSink {
    fn new() -> Self {
        CapturingProgressSink { fractions: StdMutex::new(Vec::new()) }
    }
}

impl upload_engine::ProgressSink for CapturingProgressSink {
    fn on_progress(&self, fraction: f64, _file: &FileDescriptor) {
        self.fractions.lock().unwrap().push(fraction);
    }
}

fn capabilities() -> EnvironmentCapabilities {
    EnvironmentCapabilities { kind: EnvironmentKind::NodeLike, memory_grade: CapabilityGrade::High, processor_grade: CapabilityGrade::High }
}

fn abort() -> Arc<dyn AbortToken> {
    Arc::new(CancellationAbortToken::new())
}

fn target() -> UploadTarget {
    let mut target = UploadTarget::new("http://upload.test/chunk");
    target.merge_url = Some("http://upload.test/complete".to_string());
    target
}

/// S1: a small file under one chunk uploads and merges in a single round
/// trip, with exactly one terminal `onProgress` of `1.0`.
#[tokio::test]
async fn s1_small_file_uploads_in_one_chunk_and_merges() {
    let adapter = Arc::new(ScriptedAdapter::new(2_000, "http://upload.test/chunk", "http://upload.test/complete"));
    let ledger = Arc::new(CoalescingLedger::new(adapter.clone()));
    let coordinator = UploadCoordinator::new(adapter.clone(), ledger);
    let file = FileDescriptor::new("small.bin", 2_000, None, 0, FileHandle::new("h1")).unwrap();
    let result_sink = Arc::new(CapturingResultSink::default());
    let progress_sink = Arc::new(CapturingProgressSink::new());

    coordinator
        .upload_file(&file, &target(), capabilities(), None, None, None, progress_sink.clone(), result_sink.clone(), abort(), None)
        .await
        .unwrap();

    assert_eq!(*adapter.received_chunks.lock().unwrap(), vec![0]);
    assert_eq!(result_sink.successes.lock().unwrap().len(), 1);
    assert!(result_sink.errors.lock().unwrap().is_empty());
    let fractions = progress_sink.fractions.lock().unwrap();
    assert_eq!(fractions.iter().filter(|&&f| f == 1.0).count(), 1);
}

/// S2: a file whose plan splits into five chunks resumes from a ledger that
/// already has the first two recorded, posting only the remaining three and
/// ending at exactly one terminal `onProgress` of `1.0`.
#[tokio::test]
async fn s2_resumes_only_the_pending_chunks_after_a_crash() {
    use upload_engine_domain::services::hash_engine::HashRequest;
    use upload_engine_domain::HashAlgorithm;

    let chunk_size: u64 = 2 * 1024 * 1024;
    let size = chunk_size * 5;
    let adapter = Arc::new(ScriptedAdapter::new(size, "http://upload.test/chunk", "http://upload.test/complete"));
    let ledger = Arc::new(CoalescingLedger::new(adapter.clone()));
    let file = FileDescriptor::new("big.bin", size, None, 0, FileHandle::new("h2")).unwrap();

    // Seed the ledger as if chunks 0 and 1 uploaded before a crash.
    let hash_request = HashRequest::by_size_policy(size, HashAlgorithm::Sha256, true);
    let fingerprint = upload_engine::infrastructure::adapters::hashing::compute_fingerprint_cancellable(
        adapter.as_ref(),
        file.handle(),
        size,
        &hash_request,
        Some(&file.metadata_string()),
        abort(),
    )
    .await
    .unwrap();
    let layout = ChunkLayout { chunk_size, chunk_count: 5 };
    ledger.create_or_get(&fingerprint, size, layout).await.unwrap();
    ledger.mark_uploaded_and_schedule_flush(&fingerprint, 0).await.unwrap();
    ledger.mark_uploaded_and_schedule_flush(&fingerprint, 1).await.unwrap();

    let coordinator = UploadCoordinator::new(adapter.clone(), ledger);
    let result_sink = Arc::new(CapturingResultSink::default());
    let progress_sink = Arc::new(CapturingProgressSink::new());

    coordinator
        .upload_file(&file, &target(), capabilities(), None, None, None, progress_sink.clone(), result_sink.clone(), abort(), None)
        .await
        .unwrap();

    let mut received = adapter.received_chunks.lock().unwrap().clone();
    received.sort_unstable();
    assert_eq!(received, vec![2, 3, 4]);
    let fractions = progress_sink.fractions.lock().unwrap();
    assert_eq!(fractions.iter().filter(|&&f| f == 1.0).count(), 1);
}

/// S3: a chunk that fails twice with a transient server error succeeds on
/// its third attempt, with no error reported to the caller.
#[tokio::test]
async fn s3_transient_errors_retry_then_succeed() {
    let adapter = Arc::new(ScriptedAdapter::new(2_000, "http://upload.test/chunk", "http://upload.test/complete"));
    adapter.script_chunk(0, [503, 503]);
    let ledger = Arc::new(CoalescingLedger::new(adapter.clone()));
    let coordinator = UploadCoordinator::new(adapter.clone(), ledger);
    let file = FileDescriptor::new("flaky.bin", 2_000, None, 0, FileHandle::new("h3")).unwrap();
    let result_sink = Arc::new(CapturingResultSink::default());

    coordinator
        .upload_file(&file, &target(), capabilities(), None, None, None, Arc::new(NoOpProgressSink), result_sink.clone(), abort(), None)
        .await
        .unwrap();

    assert_eq!(adapter.attempts_for(0), 3);
    assert_eq!(result_sink.successes.lock().unwrap().len(), 1);
    assert!(result_sink.errors.lock().unwrap().is_empty());
}

/// S4: a chunk that fails with a network error blocks on connectivity
/// returning rather than sleeping a timed backoff, then succeeds once the
/// `online` event fires, with no `onError` reported.
#[tokio::test]
async fn s4_network_error_waits_for_online_before_retrying() {
    let adapter = Arc::new(ScriptedAdapter::new(2_000, "http://upload.test/chunk", "http://upload.test/complete"));
    adapter.script_chunk_network_error(0, 1);
    let ledger = Arc::new(CoalescingLedger::new(adapter.clone()));
    let coordinator = Arc::new(UploadCoordinator::new(adapter.clone(), ledger));
    let file = FileDescriptor::new("offline.bin", 2_000, None, 0, FileHandle::new("h4")).unwrap();
    let result_sink = Arc::new(CapturingResultSink::default());

    let observer = Arc::new(NetworkObserver::new(upload_engine_domain::NetworkType::None));

    let upload = {
        let coordinator = coordinator.clone();
        let observer = observer.clone();
        let file = file.clone();
        let result_sink = result_sink.clone();
        tokio::spawn(async move {
            coordinator
                .upload_file(&file, &target(), capabilities(), None, None, Some(observer), Arc::new(NoOpProgressSink), result_sink, abort(), None)
                .await
        })
    };

    tokio::time::sleep(std::time::Duration::from_millis(30)).await;
    assert!(!upload.is_finished(), "upload should be blocked waiting for connectivity, not retrying on a timer");
    observer.record_event(ConnectionEvent::Online { at_millis: 0 });

    tokio::time::timeout(std::time::Duration::from_secs(5), upload).await.unwrap().unwrap().unwrap();

    assert_eq!(adapter.attempts_for(0), 2);
    assert_eq!(result_sink.successes.lock().unwrap().len(), 1);
    assert!(result_sink.errors.lock().unwrap().is_empty());
}

/// S5: a network quality drop mid-transfer narrows the scheduler's
/// concurrency without dropping or re-requesting already-planned chunks.
#[tokio::test]
async fn s5_quality_drop_narrows_concurrency_without_losing_chunks() {
    let chunk_size: u64 = 2 * 1024 * 1024;
    let size = chunk_size * 6;
    let adapter = Arc::new(ScriptedAdapter::new(size, "http://upload.test/chunk", "http://upload.test/complete"));
    let ledger = Arc::new(CoalescingLedger::new(adapter.clone()));
    let coordinator = Arc::new(UploadCoordinator::new(adapter.clone(), ledger));
    let file = FileDescriptor::new("quality.bin", size, None, 0, FileHandle::new("h5")).unwrap();
    let result_sink = Arc::new(CapturingResultSink::default());

    let observer = Arc::new(NetworkObserver::new(upload_engine_domain::NetworkType::Wifi));
    observer.record_sample(NetworkSample { timestamp_millis: 0, direction: Direction::Down, speed_kbps: 12_000.0, latency_ms: Some(20.0) });
    let initial = observer.current_grade(Some(20.0), 0.0);

    let upload = {
        let coordinator = coordinator.clone();
        let observer = observer.clone();
        let file = file.clone();
        let result_sink = result_sink.clone();
        tokio::spawn(async move {
            coordinator
                .upload_file(&file, &target(), capabilities(), None, Some(initial), Some(observer), Arc::new(NoOpProgressSink), result_sink, abort(), None)
                .await
        })
    };

    tokio::time::sleep(std::time::Duration::from_millis(2)).await;
    observer.tick(Some(2_000.0), 50.0);
    let degraded = observer.current_grade(Some(2_000.0), 50.0);
    assert!(degraded < initial, "test setup should produce a clear quality drop");

    upload.await.unwrap().unwrap();

    let mut received = adapter.received_chunks.lock().unwrap().clone();
    received.sort_unstable();
    assert_eq!(received, vec![0, 1, 2, 3, 4, 5]);
    assert_eq!(result_sink.successes.lock().unwrap().len(), 1);
}

/// S6: a permanent client error on one chunk fails the file immediately,
/// with no further attempts against that chunk and an `onError` carrying
/// the HTTP client error.
#[tokio::test]
async fn s6_permanent_client_error_fails_without_retrying() {
    let adapter = Arc::new(ScriptedAdapter::new(2_000, "http://upload.test/chunk", "http://upload.test/complete"));
    adapter.script_chunk(0, [400]);
    let ledger = Arc::new(CoalescingLedger::new(adapter.clone()));
    let coordinator = UploadCoordinator::new(adapter.clone(), ledger);
    let file = FileDescriptor::new("invalid.bin", 2_000, None, 0, FileHandle::new("h6")).unwrap();
    let result_sink = Arc::new(CapturingResultSink::default());

    let outcome = coordinator
        .upload_file(&file, &target(), capabilities(), None, None, None, Arc::new(NoOpProgressSink), result_sink.clone(), abort(), None)
        .await;

    assert!(outcome.is_err());
    assert_eq!(adapter.attempts_for(0), 1, "a non-retryable status must not be retried");
    assert!(adapter.received_chunks.lock().unwrap().is_empty());
    let errors = result_sink.errors.lock().unwrap();
    assert_eq!(errors.len(), 1);
    assert!(matches!(errors[0].1, UploadError::Validation(_)), "400 classifies as a validation error, not a transient one");
}

/// The nine universal invariants (`spec.md` §8) that span the whole
/// coordinator rather than a single domain service: idempotent resume (a
/// chunk already marked uploaded is never re-requested) and at-most-one
/// merge call on success.
#[tokio::test]
async fn resuming_an_already_complete_ledger_skips_every_chunk_and_only_merges() {
    use upload_engine_domain::services::hash_engine::HashRequest;
    use upload_engine_domain::HashAlgorithm;

    let size = 2_000u64;
    let adapter = Arc::new(ScriptedAdapter::new(size, "http://upload.test/chunk", "http://upload.test/complete"));
    let ledger = Arc::new(CoalescingLedger::new(adapter.clone()));
    let file = FileDescriptor::new("done.bin", size, None, 0, FileHandle::new("h7")).unwrap();

    let hash_request = HashRequest::by_size_policy(size, HashAlgorithm::Sha256, true);
    let fingerprint = upload_engine::infrastructure::adapters::hashing::compute_fingerprint_cancellable(
        adapter.as_ref(),
        file.handle(),
        size,
        &hash_request,
        Some(&file.metadata_string()),
        abort(),
    )
    .await
    .unwrap();
    let layout = ChunkLayout { chunk_size: size, chunk_count: 1 };
    ledger.create_or_get(&fingerprint, size, layout).await.unwrap();
    ledger.mark_uploaded_and_schedule_flush(&fingerprint, 0).await.unwrap();

    let coordinator = UploadCoordinator::new(adapter.clone(), ledger);
    let result_sink = Arc::new(CapturingResultSink::default());

    coordinator
        .upload_file(&file, &target(), capabilities(), None, None, None, Arc::new(NoOpProgressSink), result_sink.clone(), abort(), None)
        .await
        .unwrap();

    assert!(adapter.received_chunks.lock().unwrap().is_empty(), "an already-uploaded chunk must not be re-sent");
    assert_eq!(result_sink.successes.lock().unwrap().len(), 1);
}
