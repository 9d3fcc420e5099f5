// /////////////////////////////////////////////////////////////////////////////
// Upload Engine
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! The Resume Ledger's persisted per-fingerprint record (`spec.md` §3, §4.6).

use crate::value_objects::Fingerprint;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// `size` and chunk count together identify a layout; a mismatch against a
/// stored record means the file changed shape and the record must be
/// evicted rather than reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkLayout {
    pub chunk_size: u64,
    pub chunk_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResumeRecord {
    pub fingerprint: Fingerprint,
    pub size: u64,
    pub chunk_layout: ChunkLayout,
    pub uploaded_indices: BTreeSet<u64>,
    pub session_id: Option<String>,
    #[serde(with = "crate::datetime_serde")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "crate::datetime_serde")]
    pub updated_at: DateTime<Utc>,
}

impl ResumeRecord {
    pub fn new(fingerprint: Fingerprint, size: u64, chunk_layout: ChunkLayout, now: DateTime<Utc>) -> Self {
        ResumeRecord {
            fingerprint,
            size,
            chunk_layout,
            uploaded_indices: BTreeSet::new(),
            session_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether this record can be reused for a freshly computed layout, or
    /// must be evicted and replaced (`spec.md` §4.6 `createOrGet`).
    pub fn matches_layout(&self, size: u64, chunk_layout: ChunkLayout) -> bool {
        self.size == size && self.chunk_layout == chunk_layout
    }

    pub fn is_expired(&self, now: DateTime<Utc>, ttl: chrono::Duration) -> bool {
        now - self.updated_at > ttl
    }

    pub fn mark_uploaded(&mut self, index: u64, now: DateTime<Utc>) {
        self.uploaded_indices.insert(index);
        self.updated_at = now;
    }

    pub fn set_session_id(&mut self, session_id: impl Into<String>, now: DateTime<Utc>) {
        self.session_id = Some(session_id.into());
        self.updated_at = now;
    }

    pub fn is_complete(&self) -> bool {
        self.uploaded_indices.len() as u64 == self.chunk_layout.chunk_count
    }
}
