// /////////////////////////////////////////////////////////////////////////////
// Upload Engine
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Coalescing Resume Ledger
//!
//! The durable, `HostAdapter`-backed implementation of
//! `upload_engine_domain::services::resume_ledger::ResumeLedger`. Records
//! live under the `upload:resume:<fingerprint>` key (`spec.md` §6.5) as
//! JSON. Writes are coalesced per-fingerprint: `mark_uploaded` updates an
//! in-memory copy immediately and schedules a debounced flush, the same
//! two-level locking shape (global map behind a `std::sync::Mutex`, one
//! `tokio::sync::Mutex`-guarded slot per key) the teacher's
//! `GlobalResourceManager` uses for its token pools.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tracing::warn;
use upload_engine_domain::services::host_adapter::HostAdapter;
use upload_engine_domain::services::resume_ledger::{default_ttl, ResumeLedger};
use upload_engine_domain::value_objects::{ChunkLayout, Fingerprint, ResumeRecord};
use upload_engine_domain::{UploadError, UploadResult};

const KEY_PREFIX: &str = "upload:resume:";

/// Write-coalescing debounce window (`spec.md` §4.6: "≤ 500 ms").
const COALESCE_WINDOW: Duration = Duration::from_millis(500);

/// Upper bound on resident resume records before `gc()` starts evicting by
/// least-recently-updated. No fixed figure is given in the data model, so
/// 500 was picked as a generous default for a single-host engine instance.
const MAX_RESUME_RECORDS: usize = 500;

fn ledger_key(fingerprint: &Fingerprint) -> String {
    format!("{KEY_PREFIX}{}", fingerprint.as_key())
}

pub struct CoalescingLedger<A: HostAdapter + 'static> {
    adapter: Arc<A>,
    pending: StdMutex<HashMap<String, ResumeRecord>>,
    /// One lock per fingerprint key, created on first touch. Serializes the
    /// read-modify-write in `mark_uploaded`/`create_or_get` so two chunks of
    /// the same file completing concurrently can't clobber each other's
    /// update to `pending`.
    locks: StdMutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    ttl: chrono::Duration,
}

impl<A: HostAdapter + 'static> CoalescingLedger<A> {
    pub fn new(adapter: Arc<A>) -> Self {
        CoalescingLedger { adapter, pending: StdMutex::new(HashMap::new()), locks: StdMutex::new(HashMap::new()), ttl: default_ttl() }
    }

    pub fn with_ttl(adapter: Arc<A>, ttl: chrono::Duration) -> Self {
        CoalescingLedger { adapter, pending: StdMutex::new(HashMap::new()), locks: StdMutex::new(HashMap::new()), ttl }
    }

    /// Returns the keyed lock for `key`, creating it on first use. The map
    /// itself is only held long enough to get-or-insert the `Arc`; the
    /// returned lock is what callers actually await.
    fn lock_for(&self, key: &str) -> Arc<tokio::sync::Mutex<()>> {
        Arc::clone(self.locks.lock().unwrap().entry(key.to_string()).or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))))
    }

    async fn read_through(&self, key: &str) -> UploadResult<Option<ResumeRecord>> {
        if let Some(record) = self.pending.lock().unwrap().get(key).cloned() {
            return Ok(Some(record));
        }
        let Some(bytes) = self.adapter.kv_get(key).await? else {
            return Ok(None);
        };
        let record: ResumeRecord = serde_json::from_slice(&bytes)
            .map_err(|e| UploadError::Persistence(format!("corrupt resume record at {key}: {e}")))?;
        Ok(Some(record))
    }

    async fn persist(&self, key: &str, record: &ResumeRecord) -> UploadResult<()> {
        let bytes = serde_json::to_vec(record)
            .map_err(|e| UploadError::Persistence(format!("failed to serialize resume record: {e}")))?;
        self.adapter.kv_put(key, bytes).await
    }

    /// Spawns a debounced flush for `key`. Flushing twice for the same
    /// coalescing window is harmless: the second write is an idempotent
    /// overwrite with equal-or-newer state.
    fn schedule_flush(self: &Arc<Self>, key: String)
    where
        A: Send + Sync,
    {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(COALESCE_WINDOW).await;
            let record = this.pending.lock().unwrap().get(&key).cloned();
            if let Some(record) = record {
                if let Err(e) = this.persist(&key, &record).await {
                    warn!(%key, %e, "debounced resume ledger flush failed");
                }
            }
        });
    }
}

#[async_trait]
impl<A: HostAdapter + 'static> ResumeLedger for CoalescingLedger<A> {
    async fn load(&self, fingerprint: &Fingerprint) -> UploadResult<Option<ResumeRecord>> {
        let key = ledger_key(fingerprint);
        let Some(record) = self.read_through(&key).await? else {
            return Ok(None);
        };
        if record.is_expired(chrono::Utc::now(), self.ttl) {
            self.adapter.kv_delete(&key).await?;
            self.pending.lock().unwrap().remove(&key);
            return Ok(None);
        }
        Ok(Some(record))
    }

    async fn create_or_get(&self, fingerprint: &Fingerprint, size: u64, chunk_layout: ChunkLayout) -> UploadResult<ResumeRecord> {
        let key = ledger_key(fingerprint);
        let lock = self.lock_for(&key);
        let _guard = lock.lock().await;
        if let Some(existing) = self.load(fingerprint).await? {
            if existing.matches_layout(size, chunk_layout) {
                return Ok(existing);
            }
        }
        let record = ResumeRecord::new(fingerprint.clone(), size, chunk_layout, chrono::Utc::now());
        self.persist(&key, &record).await?;
        self.pending.lock().unwrap().insert(key, record.clone());
        Ok(record)
    }

    /// Updates the in-memory record immediately. Callers holding an
    /// `Arc<CoalescingLedger<A>>` should prefer
    /// `mark_uploaded_and_schedule_flush`, which also arms the debounced
    /// disk write; this trait method alone leaves that to the next
    /// `flush`/`gc` call since `&self` cannot produce the `Arc<Self>` a
    /// spawned flush task needs.
    async fn mark_uploaded(&self, fingerprint: &Fingerprint, index: u64) -> UploadResult<()> {
        let key = ledger_key(fingerprint);
        let lock = self.lock_for(&key);
        let _guard = lock.lock().await;
        let mut record = self
            .read_through(&key)
            .await?
            .ok_or_else(|| UploadError::Persistence(format!("mark_uploaded on missing resume record {key}")))?;
        record.mark_uploaded(index, chrono::Utc::now());
        self.pending.lock().unwrap().insert(key, record);
        Ok(())
    }

    async fn flush(&self, fingerprint: &Fingerprint) -> UploadResult<()> {
        let key = ledger_key(fingerprint);
        let record = self.pending.lock().unwrap().get(&key).cloned();
        if let Some(record) = record {
            self.persist(&key, &record).await?;
        }
        Ok(())
    }

    async fn clear(&self, fingerprint: &Fingerprint) -> UploadResult<()> {
        let key = ledger_key(fingerprint);
        self.pending.lock().unwrap().remove(&key);
        self.adapter.kv_delete(&key).await
    }

    async fn gc(&self) -> UploadResult<()> {
        let keys = self.adapter.kv_keys(KEY_PREFIX).await?;
        let now = chrono::Utc::now();
        let mut alive = Vec::new();
        for key in keys {
            let Some(bytes) = self.adapter.kv_get(&key).await? else { continue };
            let record: ResumeRecord = match serde_json::from_slice(&bytes) {
                Ok(r) => r,
                Err(_) => {
                    self.adapter.kv_delete(&key).await?;
                    continue;
                }
            };
            if record.is_expired(now, self.ttl) {
                self.adapter.kv_delete(&key).await?;
                self.pending.lock().unwrap().remove(&key);
            } else {
                alive.push((key, record.updated_at));
            }
        }
        if alive.len() > MAX_RESUME_RECORDS {
            alive.sort_by_key(|(_, updated_at)| *updated_at);
            let evict_count = alive.len() - MAX_RESUME_RECORDS;
            for (key, _) in alive.into_iter().take(evict_count) {
                self.adapter.kv_delete(&key).await?;
                self.pending.lock().unwrap().remove(&key);
            }
        }
        Ok(())
    }
}

impl<A: HostAdapter + 'static> CoalescingLedger<A> {
    /// Like `mark_uploaded`, but also spawns the debounced flush. Split out
    /// from the trait method because scheduling a flush needs an `Arc<Self>`
    /// receiver, which `&self` in the trait signature cannot provide;
    /// callers holding an `Arc<CoalescingLedger<A>>` should use this instead
    /// of the trait method directly.
    pub async fn mark_uploaded_and_schedule_flush(self: &Arc<Self>, fingerprint: &Fingerprint, index: u64) -> UploadResult<()> {
        let key = ledger_key(fingerprint);
        ResumeLedger::mark_uploaded(self.as_ref(), fingerprint, index).await?;
        self.schedule_flush(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::adapters::kv_store::InMemoryKv;
    use crate::infrastructure::adapters::local_adapter::LocalAdapter;
    use upload_engine_domain::HashAlgorithm;

    fn fingerprint() -> Fingerprint {
        Fingerprint::new(HashAlgorithm::Sha256, "abc123", None)
    }

    fn layout() -> ChunkLayout {
        ChunkLayout { chunk_size: 10, chunk_count: 4 }
    }

    fn ledger() -> Arc<CoalescingLedger<LocalAdapter>> {
        let adapter = Arc::new(LocalAdapter::new(Arc::new(InMemoryKv::new()), false));
        Arc::new(CoalescingLedger::new(adapter))
    }

    #[tokio::test]
    async fn create_or_get_is_idempotent_for_matching_layouts() {
        let ledger = ledger();
        let fp = fingerprint();
        let first = ledger.create_or_get(&fp, 40, layout()).await.unwrap();
        let second = ledger.create_or_get(&fp, 40, layout()).await.unwrap();
        assert_eq!(first.created_at, second.created_at);
    }

    #[tokio::test]
    async fn mismatched_layout_evicts_and_recreates() {
        let ledger = ledger();
        let fp = fingerprint();
        ledger.create_or_get(&fp, 40, layout()).await.unwrap();
        ledger.mark_uploaded_and_schedule_flush(&fp, 0).await.unwrap();
        let changed = ChunkLayout { chunk_size: 20, chunk_count: 2 };
        let fresh = ledger.create_or_get(&fp, 40, changed).await.unwrap();
        assert!(fresh.uploaded_indices.is_empty());
    }

    #[tokio::test]
    async fn mark_uploaded_is_visible_before_the_flush_fires() {
        let ledger = ledger();
        let fp = fingerprint();
        ledger.create_or_get(&fp, 40, layout()).await.unwrap();
        ledger.mark_uploaded_and_schedule_flush(&fp, 2).await.unwrap();
        let loaded = ledger.load(&fp).await.unwrap().unwrap();
        assert!(loaded.uploaded_indices.contains(&2));
    }

    #[tokio::test]
    async fn flush_persists_immediately() {
        let ledger = ledger();
        let fp = fingerprint();
        ledger.create_or_get(&fp, 40, layout()).await.unwrap();
        ResumeLedger::mark_uploaded(ledger.as_ref(), &fp, 1).await.unwrap();
        ledger.flush(&fp).await.unwrap();
        let loaded = ledger.load(&fp).await.unwrap().unwrap();
        assert!(loaded.uploaded_indices.contains(&1));
    }

    #[tokio::test]
    async fn clear_removes_the_record_entirely() {
        let ledger = ledger();
        let fp = fingerprint();
        ledger.create_or_get(&fp, 40, layout()).await.unwrap();
        ledger.clear(&fp).await.unwrap();
        assert!(ledger.load(&fp).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn gc_evicts_expired_records() {
        let ledger = ledger();
        let fp = fingerprint();
        let stale = ResumeRecord::new(fp.clone(), 40, layout(), chrono::Utc::now() - chrono::Duration::days(30));
        ledger.persist(&ledger_key(&fp), &stale).await.unwrap();
        ledger.gc().await.unwrap();
        assert!(ledger.load(&fp).await.unwrap().is_none());
    }
}
