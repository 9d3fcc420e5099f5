// /////////////////////////////////////////////////////////////////////////////
// Upload Engine
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Fingerprint Orchestration
//!
//! Drives the domain's synchronous [`StreamingHasher`] from async code, the
//! same split the teacher's `AsyncChecksumAdapter` uses for its sync
//! `ChecksumService`: reads come through `HostAdapter::read_slice`, and each
//! digest update runs inside `tokio::task::spawn_blocking` so a large file's
//! CPU cost never blocks the reactor thread.

use std::sync::Arc;
use upload_engine_domain::services::hash_engine::{
    finalize_fingerprint, plan_read_ranges, HashRequest, StreamingHasher,
};
use upload_engine_domain::services::host_adapter::HostAdapter;
use upload_engine_domain::{FileHandle, Fingerprint, UploadError, UploadResult};

/// Computes a [`Fingerprint`] for `handle`, reading through `adapter` and
/// offloading digest updates to the blocking thread pool whenever the host
/// advertises a worker (`AdapterCapabilities::has_worker`). Hosts without a
/// worker pool run the digest inline on the calling task instead.
pub async fn compute_fingerprint<A: HostAdapter + ?Sized>(
    adapter: &A,
    handle: &FileHandle,
    file_size: u64,
    request: &HashRequest,
    metadata_string: Option<&str>,
) -> UploadResult<Fingerprint> {
    let ranges = plan_read_ranges(file_size, request);
    let use_worker = adapter.capabilities().has_worker;
    let mut hasher = StreamingHasher::new(request.algorithm);

    for (offset, length) in ranges {
        let bytes = adapter.read_slice(handle, offset, length).await?;
        hasher = if use_worker {
            feed_on_blocking_pool(hasher, bytes).await?
        } else {
            hasher.update(&bytes);
            hasher
        };
    }

    finalize_fingerprint(hasher, request, file_size, metadata_string)
}

/// Moves a hasher and a slice onto `spawn_blocking`, returning the hasher
/// once the digest update completes. The hasher has no cheap way to be
/// cloned back out of a panicked task, so a join failure is reported as a
/// validation error rather than silently dropping the in-progress digest.
async fn feed_on_blocking_pool(mut hasher: StreamingHasher, bytes: Vec<u8>) -> UploadResult<StreamingHasher> {
    tokio::task::spawn_blocking(move || {
        hasher.update(&bytes);
        hasher
    })
    .await
    .map_err(|e| UploadError::Validation(format!("hash worker task failed: {e}")))
}

/// Convenience wrapper that also awaits cancellation, for callers that want
/// `compute_fingerprint` to stop early instead of running to completion.
pub async fn compute_fingerprint_cancellable<A: HostAdapter + ?Sized>(
    adapter: &A,
    handle: &FileHandle,
    file_size: u64,
    request: &HashRequest,
    metadata_string: Option<&str>,
    abort: Arc<dyn upload_engine_domain::services::host_adapter::AbortToken>,
) -> UploadResult<Fingerprint> {
    tokio::select! {
        _ = abort.cancelled() => Err(UploadError::Cancelled),
        result = compute_fingerprint(adapter, handle, file_size, request, metadata_string) => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::adapters::kv_store::InMemoryKv;
    use crate::infrastructure::adapters::local_adapter::LocalAdapter;
    use std::io::Write;
    use upload_engine_domain::{HashAlgorithm, HashMode};

    #[tokio::test]
    async fn matches_a_directly_computed_digest() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let payload = b"the quick brown fox jumps over the lazy dog".repeat(1024);
        file.write_all(&payload).unwrap();
        let handle = FileHandle::new(file.path().to_string_lossy().to_string());

        let adapter = LocalAdapter::new(Arc::new(InMemoryKv::new()), false);
        let request = HashRequest::by_size_policy(payload.len() as u64, HashAlgorithm::Sha256, false);
        let fingerprint = compute_fingerprint(&adapter, &handle, payload.len() as u64, &request, None)
            .await
            .unwrap();

        let mut direct = StreamingHasher::new(HashAlgorithm::Sha256);
        direct.update(&payload);
        assert_eq!(fingerprint.digest(), direct.finalize_hex());
    }

    #[tokio::test]
    async fn includes_a_metadata_digest_when_requested() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"small file").unwrap();
        let handle = FileHandle::new(file.path().to_string_lossy().to_string());

        let adapter = LocalAdapter::new(Arc::new(InMemoryKv::new()), false);
        let request = HashRequest { algorithm: HashAlgorithm::Sha256, mode: HashMode::Full, sample_size: 0, include_metadata: true };
        let fingerprint = compute_fingerprint(&adapter, &handle, 10, &request, Some("name=small.txt"))
            .await
            .unwrap();

        assert!(fingerprint.metadata_digest().is_some());
    }
}
