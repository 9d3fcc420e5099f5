// /////////////////////////////////////////////////////////////////////////////
// Upload Engine
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Key-Value Store Backends
//!
//! `LocalAdapter` delegates persistent storage to a `KvStore`, keeping the
//! durable-vs-non-durable choice out of the adapter itself. `InMemoryKv` is
//! the default (and what the integration tests use); `SqliteKv` is the
//! durable backend selected when `EngineSettings::ledger_db_path` is set.

use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::collections::HashMap;
use upload_engine_domain::{UploadError, UploadResult};

#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> UploadResult<Option<Vec<u8>>>;
    async fn put(&self, key: &str, value: Vec<u8>) -> UploadResult<()>;
    async fn delete(&self, key: &str) -> UploadResult<()>;
    async fn keys(&self, prefix: &str) -> UploadResult<Vec<String>>;
}

/// Non-durable, process-lifetime KV store. Used by default and by tests.
#[derive(Default)]
pub struct InMemoryKv {
    entries: parking_lot::Mutex<HashMap<String, Vec<u8>>>,
}

impl InMemoryKv {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for InMemoryKv {
    async fn get(&self, key: &str) -> UploadResult<Option<Vec<u8>>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> UploadResult<()> {
        self.entries.lock().insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> UploadResult<()> {
        self.entries.lock().remove(key);
        Ok(())
    }

    async fn keys(&self, prefix: &str) -> UploadResult<Vec<String>> {
        Ok(self.entries.lock().keys().filter(|k| k.starts_with(prefix)).cloned().collect())
    }
}

/// Durable KV store backed by a single-table SQLite database, for hosts that
/// advertise `AdapterCapabilities::durable_kv`.
pub struct SqliteKv {
    pool: SqlitePool,
}

impl SqliteKv {
    pub async fn connect(database_url: &str) -> UploadResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect(database_url)
            .await
            .map_err(|e| UploadError::Persistence(format!("failed to open sqlite kv store: {e}")))?;

        sqlx::query("CREATE TABLE IF NOT EXISTS kv_store (key TEXT PRIMARY KEY, value BLOB NOT NULL)")
            .execute(&pool)
            .await
            .map_err(|e| UploadError::Persistence(format!("failed to create kv_store table: {e}")))?;

        Ok(SqliteKv { pool })
    }
}

#[async_trait]
impl KvStore for SqliteKv {
    async fn get(&self, key: &str) -> UploadResult<Option<Vec<u8>>> {
        let row: Option<(Vec<u8>,)> = sqlx::query_as("SELECT value FROM kv_store WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| UploadError::Persistence(e.to_string()))?;
        Ok(row.map(|(value,)| value))
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> UploadResult<()> {
        sqlx::query("INSERT INTO kv_store (key, value) VALUES (?, ?) ON CONFLICT(key) DO UPDATE SET value = excluded.value")
            .bind(key)
            .bind(value)
            .execute(&self.pool)
            .await
            .map_err(|e| UploadError::Persistence(e.to_string()))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> UploadResult<()> {
        sqlx::query("DELETE FROM kv_store WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| UploadError::Persistence(e.to_string()))?;
        Ok(())
    }

    async fn keys(&self, prefix: &str) -> UploadResult<Vec<String>> {
        let pattern = format!("{prefix}%");
        let rows: Vec<(String,)> = sqlx::query_as("SELECT key FROM kv_store WHERE key LIKE ?")
            .bind(pattern)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| UploadError::Persistence(e.to_string()))?;
        Ok(rows.into_iter().map(|(key,)| key).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_kv_roundtrips_and_deletes() {
        let kv = InMemoryKv::new();
        kv.put("upload:resume:abc", b"payload".to_vec()).await.unwrap();
        assert_eq!(kv.get("upload:resume:abc").await.unwrap(), Some(b"payload".to_vec()));
        kv.delete("upload:resume:abc").await.unwrap();
        assert_eq!(kv.get("upload:resume:abc").await.unwrap(), None);
    }

    #[tokio::test]
    async fn in_memory_kv_lists_by_prefix() {
        let kv = InMemoryKv::new();
        kv.put("upload:resume:a", vec![1]).await.unwrap();
        kv.put("upload:resume:b", vec![2]).await.unwrap();
        kv.put("upload:config:history", vec![3]).await.unwrap();
        let mut keys = kv.keys("upload:resume:").await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["upload:resume:a".to_string(), "upload:resume:b".to_string()]);
    }

    #[tokio::test]
    async fn sqlite_kv_roundtrips_through_an_in_memory_database() {
        let kv = SqliteKv::connect("sqlite::memory:").await.unwrap();
        kv.put("upload:resume:abc", b"payload".to_vec()).await.unwrap();
        assert_eq!(kv.get("upload:resume:abc").await.unwrap(), Some(b"payload".to_vec()));
        kv.put("upload:resume:abc", b"updated".to_vec()).await.unwrap();
        assert_eq!(kv.get("upload:resume:abc").await.unwrap(), Some(b"updated".to_vec()));
    }
}
