// /////////////////////////////////////////////////////////////////////////////
// Upload Engine
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Upload Engine CLI
//!
//! Wires the validated command line onto the application-layer
//! `UploadEngine`: parses and validates argv, builds the local adapter and
//! resume ledger the `--ledger-dir` flag selects, then drives `upload` and
//! `resume` through the same batch engine (resume is a plain re-submission;
//! the coordinator's fingerprint lookup skips chunks the ledger already
//! has) and `gc` directly against the ledger.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{info, warn};

use upload_engine::infrastructure::adapters::kv_store::{InMemoryKv, KvStore, SqliteKv};
use upload_engine::infrastructure::adapters::local_adapter::LocalAdapter;
use upload_engine::infrastructure::runtime::resume_ledger::CoalescingLedger;
use upload_engine::{FileDescriptor, FileHandle, NoOpProgressSink, ResultSink, UploadEngine, UploadError, UploadResult, UploadTarget};
use upload_engine_domain::services::config_advisor::{CapabilityGrade, EnvironmentCapabilities, EnvironmentKind};
use upload_engine_domain::services::resume_ledger::ResumeLedger;

use upload_engine_bootstrap::config::BootstrapConfig;
use upload_engine_bootstrap::logger::{BootstrapLogger, ConsoleLogger};
use upload_engine_bootstrap::platform::{create_platform, Platform};
use upload_engine_bootstrap::shutdown::ShutdownCoordinator;
use upload_engine_bootstrap::{signals, ValidatedCommand};

/// Collects the first error raised across a batch so the process can exit
/// with a meaningful status. `UploadEngine` reports outcomes only through
/// sink callbacks; this turns those callbacks back into a `UploadResult`.
#[derive(Default)]
struct CollectingResultSink {
    first_error: StdMutex<Option<UploadError>>,
}

impl CollectingResultSink {
    fn outcome(&self) -> UploadResult<()> {
        match self.first_error.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl ResultSink for CollectingResultSink {
    fn on_success(&self, _response: serde_json::Value, _file: &FileDescriptor) {}

    fn on_error(&self, error: &UploadError, file: &FileDescriptor) {
        warn!(file = file.name(), %error, "upload failed");
        let mut slot = self.first_error.lock().unwrap();
        if slot.is_none() {
            *slot = Some(error.clone());
        }
    }

    fn on_complete(&self, successful: &[FileDescriptor], failed: &[FileDescriptor]) {
        info!(succeeded = successful.len(), failed = failed.len(), "batch complete");
    }
}

fn capabilities_from_platform(platform: &dyn Platform) -> EnvironmentCapabilities {
    const GIB: u64 = 1024 * 1024 * 1024;

    let processor_grade = match platform.cpu_count() {
        n if n >= 8 => CapabilityGrade::High,
        n if n >= 4 => CapabilityGrade::Medium,
        _ => CapabilityGrade::Low,
    };

    let memory_grade = match platform.total_memory() {
        Ok(bytes) if bytes >= 8 * GIB => CapabilityGrade::High,
        Ok(bytes) if bytes >= 2 * GIB => CapabilityGrade::Medium,
        Ok(_) => CapabilityGrade::Low,
        Err(_) => CapabilityGrade::Medium,
    };

    EnvironmentCapabilities { kind: EnvironmentKind::NodeLike, memory_grade, processor_grade }
}

/// Builds a `FileDescriptor` for an already-validated, existing path.
fn file_descriptor_for(path: &Path) -> UploadResult<FileDescriptor> {
    let metadata =
        std::fs::metadata(path).map_err(|e| UploadError::ReadError(format!("failed to stat {}: {e}", path.display())))?;

    let last_modified_millis = metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0);

    let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_else(|| path.to_string_lossy().into_owned());

    FileDescriptor::new(name, metadata.len(), None, last_modified_millis, FileHandle::new(path.to_string_lossy().into_owned()))
}

/// Opens the local adapter and resume ledger. `--ledger-dir` selects a
/// durable SQLite-backed KV store; without it the ledger lives only for
/// the process's lifetime.
async fn build_ledger(ledger_dir: Option<&Path>) -> UploadResult<(Arc<LocalAdapter>, Arc<CoalescingLedger<LocalAdapter>>)> {
    let (kv, durable): (Arc<dyn KvStore>, bool) = match ledger_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .map_err(|e| UploadError::Persistence(format!("failed to create ledger directory {}: {e}", dir.display())))?;
            let database_url = format!("sqlite://{}", dir.join("resume-ledger.db").display());
            (Arc::new(SqliteKv::connect(&database_url).await?), true)
        }
        None => (Arc::new(InMemoryKv::new()), false),
    };

    let adapter = Arc::new(LocalAdapter::new(kv, durable));
    let ledger = Arc::new(CoalescingLedger::new(adapter.clone()));
    Ok((adapter, ledger))
}

async fn run_upload(
    files: Vec<PathBuf>,
    target: String,
    chunk_size_mb: Option<usize>,
    ledger_dir: Option<PathBuf>,
    capabilities: EnvironmentCapabilities,
    concurrency_override: Option<usize>,
    shutdown: &ShutdownCoordinator,
    grace_period: std::time::Duration,
) -> UploadResult<()> {
    if let Some(mb) = chunk_size_mb {
        warn!(chunk_size_mb = mb, "--chunk-size-mb is not wired into the Config Advisor; chunk size is still capability-driven");
    }
    if let Some(n) = concurrency_override {
        warn!(concurrency = n, "--concurrency is not wired into the Config Advisor; concurrency is still capability-driven");
    }

    let (adapter, ledger) = build_ledger(ledger_dir.as_deref()).await?;

    let mut descriptors = Vec::with_capacity(files.len());
    for path in &files {
        match file_descriptor_for(path) {
            Ok(descriptor) => descriptors.push(descriptor),
            Err(e) => warn!(path = %path.display(), error = %e, "skipping file"),
        }
    }
    if descriptors.is_empty() {
        return Err(UploadError::Validation("no valid files to upload".into()));
    }

    let result_sink = Arc::new(CollectingResultSink::default());
    let engine = Arc::new(UploadEngine::new(
        adapter,
        ledger,
        UploadTarget::new(target),
        capabilities,
        Arc::new(NoOpProgressSink),
        result_sink.clone(),
    ));
    engine.add_files(descriptors);

    let run_engine = engine.clone();
    let run = tokio::spawn(async move { run_engine.start().await });
    tokio::pin!(run);

    let token = shutdown.token();
    tokio::select! {
        _ = &mut run => {}
        _ = token.cancelled() => {
            warn!("shutdown requested, cancelling in-flight uploads");
            engine.cancel(None);
            if tokio::time::timeout(grace_period, &mut run).await.is_err() {
                warn!("grace period expired with uploads still in flight");
            }
        }
    }

    result_sink.outcome()
}

async fn run_gc(ledger_dir: Option<PathBuf>) -> UploadResult<()> {
    let (_adapter, ledger) = build_ledger(ledger_dir.as_deref()).await?;
    ledger.gc().await?;
    info!("resume ledger garbage collection complete");
    Ok(())
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let bootstrap_logger = ConsoleLogger::new();

    let cli = match upload_engine_bootstrap::bootstrap_cli() {
        Ok(cli) => cli,
        Err(e) => {
            bootstrap_logger.error(&format!("argument error: {e}"));
            return std::process::ExitCode::from(upload_engine_bootstrap::ExitCode::Usage);
        }
    };

    if cli.verbose && std::env::var_os("RUST_LOG").is_none() {
        std::env::set_var("RUST_LOG", "debug");
    }
    upload_engine::infrastructure::logging::init_logging(false);
    bootstrap_logger.info("upload engine starting");

    let bootstrap_config = BootstrapConfig::default();
    let shutdown = ShutdownCoordinator::new(bootstrap_config.shutdown_grace_period);
    let _signal_task = signals::install(shutdown.clone());

    let platform = create_platform();
    let capabilities = capabilities_from_platform(platform.as_ref());

    let outcome = match cli.command {
        ValidatedCommand::Upload { files, target, chunk_size_mb, ledger_dir } => {
            run_upload(
                files,
                target,
                chunk_size_mb,
                ledger_dir,
                capabilities,
                cli.concurrency,
                &shutdown,
                bootstrap_config.shutdown_grace_period,
            )
            .await
        }
        ValidatedCommand::Resume { files, target, ledger_dir } => {
            run_upload(files, target, None, ledger_dir, capabilities, cli.concurrency, &shutdown, bootstrap_config.shutdown_grace_period)
                .await
        }
        ValidatedCommand::Gc { ledger_dir } => run_gc(ledger_dir).await,
    };

    upload_engine_bootstrap::result_to_exit_code(outcome)
}
