// /////////////////////////////////////////////////////////////////////////////
// Upload Engine
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Local Host Adapter
//!
//! Reference `HostAdapter` implementation for a native process: file slicing
//! via `tokio::fs`, HTTP transport via `reqwest`, persistence delegated to a
//! `KvStore`, and timers via `tokio::time::sleep` cancellable through a
//! `tokio_util::sync::CancellationToken`.

use crate::infrastructure::adapters::kv_store::KvStore;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::sync::CancellationToken;
use tracing::warn;
use upload_engine_domain::services::host_adapter::{
    AbortToken, AdapterCapabilities, ByteProgressSink, HostAdapter, HttpMethod, HttpRequest, HttpResponse, ScheduleHandle,
};
use upload_engine_domain::{FileHandle, UploadError, UploadResult};

/// `AbortToken` backed by a `tokio_util` cancellation token (grounded in the
/// teacher's shutdown coordinator, which uses the same primitive for
/// cooperative cancellation).
pub struct CancellationAbortToken(CancellationToken);

impl CancellationAbortToken {
    pub fn new() -> Self {
        CancellationAbortToken(CancellationToken::new())
    }

    pub fn cancel(&self) {
        self.0.cancel();
    }
}

impl Default for CancellationAbortToken {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AbortToken for CancellationAbortToken {
    fn is_cancelled(&self) -> bool {
        self.0.is_cancelled()
    }

    async fn cancelled(&self) {
        self.0.cancelled().await
    }
}

struct TimerHandle(CancellationToken);

#[async_trait]
impl ScheduleHandle for TimerHandle {
    async fn cancel(&self) {
        self.0.cancel();
    }
}

pub struct LocalAdapter {
    http: reqwest::Client,
    kv: Arc<dyn KvStore>,
    capabilities: AdapterCapabilities,
}

impl LocalAdapter {
    pub fn new(kv: Arc<dyn KvStore>, durable_kv: bool) -> Self {
        LocalAdapter {
            http: reqwest::Client::new(),
            kv,
            capabilities: AdapterCapabilities {
                has_worker: true,
                has_crypto: true,
                has_indexed_kv: true,
                has_streams: true,
                max_request_bytes: None,
                max_concurrent_http: None,
                durable_kv,
            },
        }
    }
}

#[async_trait]
impl HostAdapter for LocalAdapter {
    fn capabilities(&self) -> AdapterCapabilities {
        self.capabilities
    }

    async fn read_slice(&self, handle: &FileHandle, offset: u64, length: u64) -> UploadResult<Vec<u8>> {
        let mut file = tokio::fs::File::open(handle.as_str()).await?;
        file.seek(std::io::SeekFrom::Start(offset)).await?;
        let mut buf = vec![0u8; length as usize];
        file.read_exact(&mut buf).await?;
        Ok(buf)
    }

    async fn send_request(
        &self,
        request: HttpRequest,
        abort: Arc<dyn AbortToken>,
        progress: Option<Arc<dyn ByteProgressSink>>,
    ) -> UploadResult<HttpResponse> {
        let mut builder = match request.method {
            HttpMethod::Get => self.http.get(&request.url),
            HttpMethod::Post => self.http.post(&request.url).body(request.body.clone()),
        };
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }

        let body_len = request.body.len() as u64;
        let response = tokio::select! {
            _ = abort.cancelled() => return Err(UploadError::Cancelled),
            result = builder.send() => result.map_err(|e| UploadError::Network(e.to_string()))?,
        };

        if let Some(sink) = progress {
            sink.on_bytes_sent(body_len);
        }

        let status = response.status().as_u16();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_str().unwrap_or_default().to_string()))
            .collect();
        let body = response.bytes().await.map_err(|e| UploadError::Network(e.to_string()))?.to_vec();
        Ok(HttpResponse { status, headers, body })
    }

    async fn kv_get(&self, key: &str) -> UploadResult<Option<Vec<u8>>> {
        self.kv.get(key).await
    }

    async fn kv_put(&self, key: &str, value: Vec<u8>) -> UploadResult<()> {
        self.kv.put(key, value).await
    }

    async fn kv_delete(&self, key: &str) -> UploadResult<()> {
        self.kv.delete(key).await
    }

    async fn kv_keys(&self, prefix: &str) -> UploadResult<Vec<String>> {
        self.kv.keys(prefix).await
    }

    async fn schedule_after(&self, ms: u64) -> Arc<dyn ScheduleHandle> {
        let token = CancellationToken::new();
        let child = token.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_millis(ms)) => {}
                _ = child.cancelled() => {
                    warn!("scheduled timer cancelled before firing");
                }
            }
        });
        Arc::new(TimerHandle(token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::adapters::kv_store::InMemoryKv;
    use std::io::Write;

    fn adapter() -> LocalAdapter {
        LocalAdapter::new(Arc::new(InMemoryKv::new()), false)
    }

    #[tokio::test]
    async fn read_slice_reads_the_requested_byte_range() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"hello, upload engine").unwrap();
        let handle = FileHandle::new(file.path().to_string_lossy().to_string());

        let adapter = adapter();
        let slice = adapter.read_slice(&handle, 7, 6).await.unwrap();
        assert_eq!(slice, b"upload");
    }

    #[tokio::test]
    async fn kv_roundtrips_through_the_in_memory_backend() {
        let adapter = adapter();
        adapter.kv_put("upload:resume:a", vec![1, 2, 3]).await.unwrap();
        assert_eq!(adapter.kv_get("upload:resume:a").await.unwrap(), Some(vec![1, 2, 3]));
    }

    #[tokio::test]
    async fn schedule_after_can_be_cancelled_before_firing() {
        let adapter = adapter();
        let handle = adapter.schedule_after(10_000).await;
        handle.cancel().await;
    }
}
