// /////////////////////////////////////////////////////////////////////////////
// Upload Engine
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Chunk Plan Value Object
//!
//! An ordered, contiguous layout of a file into chunks. Produced by
//! `crate::services::chunk_planner::ChunkPlanner` and consumed by the Task
//! Scheduler and Upload Coordinator.
//!
//! ## Invariants
//!
//! - Indices are `0..N` contiguous.
//! - `Σ length == file size`.
//! - Every chunk's length is in `[minChunk, maxChunk]` except possibly the
//!   last one, which may be smaller.

use serde::{Deserialize, Serialize};

/// One chunk's position and extent within the original file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkSpec {
    pub index: u64,
    pub offset: u64,
    pub length: u64,
}

/// The full chunk layout for one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkPlan {
    chunks: Vec<ChunkSpec>,
    file_size: u64,
}

impl ChunkPlan {
    /// Builds a plan from already-computed specs, verifying the invariants
    /// in `spec.md` §3/§8 (coverage, contiguity, ordering).
    pub(crate) fn from_specs(chunks: Vec<ChunkSpec>, file_size: u64) -> Self {
        debug_assert!(Self::is_contiguous_cover(&chunks, file_size));
        ChunkPlan { chunks, file_size }
    }

    fn is_contiguous_cover(chunks: &[ChunkSpec], file_size: u64) -> bool {
        let mut expected_offset = 0u64;
        for (i, c) in chunks.iter().enumerate() {
            if c.index != i as u64 || c.offset != expected_offset {
                return false;
            }
            expected_offset += c.length;
        }
        expected_offset == file_size
    }

    pub fn chunks(&self) -> &[ChunkSpec] {
        &self.chunks
    }

    pub fn chunk_count(&self) -> u64 {
        self.chunks.len() as u64
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn get(&self, index: u64) -> Option<&ChunkSpec> {
        self.chunks.get(index as usize)
    }

    /// All indices not present in `uploaded`, in ascending order. Used to
    /// compute the resume set for idempotent restarts (`spec.md` §8
    /// invariant 3).
    pub fn pending_indices(&self, uploaded: &std::collections::BTreeSet<u64>) -> Vec<u64> {
        self.chunks
            .iter()
            .map(|c| c.index)
            .filter(|i| !uploaded.contains(i))
            .collect()
    }
}
