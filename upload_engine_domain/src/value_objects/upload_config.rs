// /////////////////////////////////////////////////////////////////////////////
// Upload Engine
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Tuning parameters produced by the Config Advisor (`spec.md` §4.5) and
//! consumed by the Task Scheduler and Retry Controller.

use crate::value_objects::{ChunkSize, Concurrency};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UploadConfig {
    pub chunk_size: ChunkSize,
    pub concurrency: Concurrency,
    pub timeout_ms: u64,
    pub retry_budget: u32,
    pub retry_base_delay_ms: u64,
    pub use_worker: bool,
}

impl UploadConfig {
    /// Absolute timeout bounds from the final clamp rule: `[10s, 120s]`.
    pub const MIN_TIMEOUT_MS: u64 = 10_000;
    pub const MAX_TIMEOUT_MS: u64 = 120_000;

    /// Absolute retry budget bounds: `[0, 5]`.
    pub const MIN_RETRY_BUDGET: u32 = 0;
    pub const MAX_RETRY_BUDGET: u32 = 5;

    /// Clamps `timeout_ms` and `retry_budget` into their absolute bounds.
    /// `chunk_size` and `concurrency` clamp themselves on construction.
    pub fn clamp_to_absolute_bounds(mut self) -> Self {
        self.timeout_ms = self.timeout_ms.clamp(Self::MIN_TIMEOUT_MS, Self::MAX_TIMEOUT_MS);
        self.retry_budget = self.retry_budget.clamp(Self::MIN_RETRY_BUDGET, Self::MAX_RETRY_BUDGET);
        self
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        UploadConfig {
            chunk_size: ChunkSize::default(),
            concurrency: Concurrency::default(),
            timeout_ms: 30_000,
            retry_budget: 3,
            retry_base_delay_ms: 1_000,
            use_worker: false,
        }
        .clamp_to_absolute_bounds()
    }
}
