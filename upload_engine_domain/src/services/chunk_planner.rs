// /////////////////////////////////////////////////////////////////////////////
// Upload Engine
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Chunk Planner
//!
//! Pure function mapping a file size and advisor hints onto a [`ChunkPlan`]
//! (`spec.md` §4.3). No I/O, no state; safe to call from anywhere.

use crate::value_objects::{ChunkPlan, ChunkSize, ChunkSpec};

pub struct ChunkPlanner;

impl ChunkPlanner {
    /// `length = clamp(targetChunkSize, minChunk, maxChunk)` for every chunk
    /// but the last, which may be smaller. If `size <= minChunk`, the plan
    /// has exactly one chunk of length `size`.
    pub fn plan(size: u64, target_chunk_size: ChunkSize, min_chunk: ChunkSize, max_chunk: ChunkSize) -> ChunkPlan {
        if size <= min_chunk.bytes() as u64 {
            return ChunkPlan::from_specs(vec![ChunkSpec { index: 0, offset: 0, length: size }], size);
        }

        let length = (target_chunk_size.bytes() as u64).clamp(min_chunk.bytes() as u64, max_chunk.bytes() as u64);
        let mut chunks = Vec::new();
        let mut offset = 0u64;
        let mut index = 0u64;
        while offset < size {
            let remaining = size - offset;
            let this_length = length.min(remaining);
            chunks.push(ChunkSpec { index, offset, length: this_length });
            offset += this_length;
            index += 1;
        }
        ChunkPlan::from_specs(chunks, size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds() -> (ChunkSize, ChunkSize) {
        (ChunkSize::new(ChunkSize::MIN_SIZE).unwrap(), ChunkSize::new(ChunkSize::MAX_SIZE).unwrap())
    }

    #[test]
    fn small_file_fits_one_chunk() {
        let (min, max) = bounds();
        let plan = ChunkPlanner::plan(100, ChunkSize::default(), min, max);
        assert_eq!(plan.chunk_count(), 1);
        assert_eq!(plan.get(0).unwrap().length, 100);
    }

    #[test]
    fn large_file_splits_into_target_sized_chunks_except_last() {
        let (min, max) = bounds();
        let target = ChunkSize::from_mb(2).unwrap();
        let plan = ChunkPlanner::plan(5 * 1024 * 1024, target, min, max);
        assert_eq!(plan.chunk_count(), 3);
        assert_eq!(plan.get(0).unwrap().length, 2 * 1024 * 1024);
        assert_eq!(plan.get(1).unwrap().length, 2 * 1024 * 1024);
        assert_eq!(plan.get(2).unwrap().length, 1024 * 1024);
    }

    #[test]
    fn coverage_invariant_holds_across_sizes() {
        let (min, max) = bounds();
        for size in [1u64, 1_000, 256 * 1024, 10_000_000, 123_456_789] {
            let plan = ChunkPlanner::plan(size, ChunkSize::default(), min, max);
            let total: u64 = plan.chunks().iter().map(|c| c.length).sum();
            assert_eq!(total, size, "size={size}");
            for (i, c) in plan.chunks().iter().enumerate() {
                assert_eq!(c.index, i as u64);
            }
        }
    }
}
