// /////////////////////////////////////////////////////////////////////////////
// Upload Engine
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Resume Ledger Port
//!
//! Durable record of fingerprint → uploaded chunk indices (`spec.md` §4.6).
//! Like [`crate::services::host_adapter::HostAdapter`], this is an
//! infrastructure port: it is backed by the Adapter's key-value store, so it
//! is async even though it lives in the domain crate. The write-coalescing,
//! per-fingerprint locking, and GC scheduling are left to a concrete
//! implementation in the infrastructure layer; this trait only fixes the
//! contract every such implementation must satisfy.

use crate::error::UploadResult;
use crate::value_objects::{ChunkLayout, Fingerprint, ResumeRecord};
use async_trait::async_trait;
use chrono::Duration;

/// Default TTL for a resume record: 7 days (`spec.md` §3).
pub fn default_ttl() -> Duration {
    Duration::days(7)
}

#[async_trait]
pub trait ResumeLedger: Send + Sync {
    /// Returns the record if present and not expired.
    async fn load(&self, fingerprint: &Fingerprint) -> UploadResult<Option<ResumeRecord>>;

    /// Returns the existing record if its layout matches, otherwise evicts
    /// it and creates a fresh one.
    async fn create_or_get(&self, fingerprint: &Fingerprint, size: u64, chunk_layout: ChunkLayout) -> UploadResult<ResumeRecord>;

    /// Atomically adds `index` to the uploaded set and bumps `updatedAt`.
    /// Implementations coalesce writes within a short window (default
    /// 500ms) but must guarantee the final state is flushed before this
    /// call's future resolves if the caller awaits `flush` afterward.
    async fn mark_uploaded(&self, fingerprint: &Fingerprint, index: u64) -> UploadResult<()>;

    /// Forces any pending coalesced write for `fingerprint` to be persisted
    /// immediately. Called before `onSuccess` to guarantee durability.
    async fn flush(&self, fingerprint: &Fingerprint) -> UploadResult<()>;

    /// Removes the record, called on successful completion or cancel.
    async fn clear(&self, fingerprint: &Fingerprint) -> UploadResult<()>;

    /// Removes expired records; evicts by LRU on `updatedAt` when storage
    /// quota is hit. Called at engine start and daily.
    async fn gc(&self) -> UploadResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_ttl_is_seven_days() {
        assert_eq!(default_ttl(), Duration::days(7));
    }
}
