// /////////////////////////////////////////////////////////////////////////////
// Upload Engine
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Host Adapter Port
//!
//! The boundary between the core and the host environment (browser, WebView,
//! mini-program runtime, Node-like host): file slicing, HTTP transport,
//! persistent key-value storage, and timers (`spec.md` §4.1, §6.1).
//!
//! ## Architecture Note - Infrastructure Port
//!
//! Like the teacher's file I/O service, this trait is **async** even though
//! it lives in the domain crate: it is an infrastructure port, not a
//! CPU-bound domain service. Slicing, HTTP, and KV access are all I/O-bound
//! and belong behind an `async_trait` boundary so concrete adapters can use
//! `tokio` underneath without the domain crate depending on it directly.
//!
//! The core never imports environment APIs itself; every such call is routed
//! through this trait.

use crate::error::UploadResult;
use crate::value_objects::FileHandle;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Flat, pre-computed capability record passed at construction
/// (`spec.md` §6.1, §9 "Environment-dependent capabilities").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdapterCapabilities {
    pub has_worker: bool,
    pub has_crypto: bool,
    pub has_indexed_kv: bool,
    pub has_streams: bool,
    pub max_request_bytes: Option<u64>,
    pub max_concurrent_http: Option<usize>,
    /// Whether `kvPut`/`kvDelete` survive a process restart. When false the
    /// Resume Ledger degrades to best-effort, in-memory-only operation.
    pub durable_kv: bool,
}

impl Default for AdapterCapabilities {
    fn default() -> Self {
        AdapterCapabilities {
            has_worker: false,
            has_crypto: true,
            has_indexed_kv: true,
            has_streams: true,
            max_request_bytes: None,
            max_concurrent_http: None,
            durable_kv: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub url: String,
    pub method: HttpMethod,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Cooperative cancellation handle, signaled exactly once (`spec.md` §5
/// "Cancellation").
#[async_trait]
pub trait AbortToken: Send + Sync {
    fn is_cancelled(&self) -> bool;
    async fn cancelled(&self);
}

/// Reports cumulative bytes sent for an in-flight upload, when the adapter
/// supports per-byte progress.
pub trait ByteProgressSink: Send + Sync {
    fn on_bytes_sent(&self, cumulative_bytes: u64);
}

/// Handle returned by `schedule_after`, used to cancel a pending timer.
#[async_trait]
pub trait ScheduleHandle: Send + Sync {
    async fn cancel(&self);
}

#[async_trait]
pub trait HostAdapter: Send + Sync {
    fn capabilities(&self) -> AdapterCapabilities;

    /// Reads `[offset, offset+length)` from the file behind `handle`. Safe
    /// to call concurrently with distinct ranges. Fails with a `ReadError`
    /// wrapping the underlying I/O failure on read error.
    async fn read_slice(&self, handle: &FileHandle, offset: u64, length: u64) -> UploadResult<Vec<u8>>;

    /// Sends an HTTP request, honoring `abort` by aborting the in-flight
    /// transfer, and reporting cumulative bytes sent to `progress` when
    /// supported.
    async fn send_request(
        &self,
        request: HttpRequest,
        abort: Arc<dyn AbortToken>,
        progress: Option<Arc<dyn ByteProgressSink>>,
    ) -> UploadResult<HttpResponse>;

    async fn kv_get(&self, key: &str) -> UploadResult<Option<Vec<u8>>>;
    async fn kv_put(&self, key: &str, value: Vec<u8>) -> UploadResult<()>;
    async fn kv_delete(&self, key: &str) -> UploadResult<()>;
    async fn kv_keys(&self, prefix: &str) -> UploadResult<Vec<String>>;

    /// Schedules `ScheduleHandle::cancel` as the means of aborting a pending
    /// delay; the callback itself is driven by the caller awaiting
    /// `schedule_after`, which resolves after `ms` unless cancelled first.
    async fn schedule_after(&self, ms: u64) -> Arc<dyn ScheduleHandle>;
}

#[async_trait]
impl HostAdapter for Arc<dyn HostAdapter> {
    fn capabilities(&self) -> AdapterCapabilities {
        (**self).capabilities()
    }

    async fn read_slice(&self, handle: &FileHandle, offset: u64, length: u64) -> UploadResult<Vec<u8>> {
        (**self).read_slice(handle, offset, length).await
    }

    async fn send_request(
        &self,
        request: HttpRequest,
        abort: Arc<dyn AbortToken>,
        progress: Option<Arc<dyn ByteProgressSink>>,
    ) -> UploadResult<HttpResponse> {
        (**self).send_request(request, abort, progress).await
    }

    async fn kv_get(&self, key: &str) -> UploadResult<Option<Vec<u8>>> {
        (**self).kv_get(key).await
    }

    async fn kv_put(&self, key: &str, value: Vec<u8>) -> UploadResult<()> {
        (**self).kv_put(key, value).await
    }

    async fn kv_delete(&self, key: &str) -> UploadResult<()> {
        (**self).kv_delete(key).await
    }

    async fn kv_keys(&self, prefix: &str) -> UploadResult<Vec<String>> {
        (**self).kv_keys(prefix).await
    }

    async fn schedule_after(&self, ms: u64) -> Arc<dyn ScheduleHandle> {
        (**self).schedule_after(ms).await
    }
}
