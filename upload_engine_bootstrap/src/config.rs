// Upload Engine
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.

//! # Bootstrap Configuration
//!
//! The small slice of configuration the bootstrap layer itself needs before
//! the application layer's richer, file-backed configuration (see
//! `upload_engine::infrastructure::config`) takes over: how many worker
//! threads to give the tokio runtime and how long to wait during graceful
//! shutdown.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct BootstrapConfig {
    pub worker_threads: Option<usize>,
    pub shutdown_grace_period: Duration,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        BootstrapConfig {
            worker_threads: None,
            shutdown_grace_period: Duration::from_secs(crate::shutdown::DEFAULT_GRACE_PERIOD_SECS),
        }
    }
}

impl BootstrapConfig {
    pub fn with_worker_threads(mut self, threads: Option<usize>) -> Self {
        self.worker_threads = threads;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_grace_period_matches_shutdown_constant() {
        let config = BootstrapConfig::default();
        assert_eq!(config.shutdown_grace_period.as_secs(), crate::shutdown::DEFAULT_GRACE_PERIOD_SECS);
    }
}
