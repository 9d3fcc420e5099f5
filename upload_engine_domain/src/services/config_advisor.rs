// /////////////////////////////////////////////////////////////////////////////
// Upload Engine
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Config Advisor
//!
//! Pure function mapping runtime observations onto an [`UploadConfig`]
//! (`spec.md` §4.5). Five rules apply in order; each may override fields set
//! by an earlier rule. No I/O, no mutable state.

use crate::value_objects::{ChunkSize, Concurrency, NetworkQualityGrade, UploadConfig};

/// Coarse environment classification (`spec.md` §4.1 Adapter variants).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvironmentKind {
    StandardBrowser,
    WebView,
    WechatMiniProgram,
    AlipayMiniProgram,
    BytedanceMiniProgram,
    BaiduMiniProgram,
    NodeLike,
}

impl EnvironmentKind {
    fn is_mini_program(self) -> bool {
        matches!(
            self,
            EnvironmentKind::WechatMiniProgram
                | EnvironmentKind::AlipayMiniProgram
                | EnvironmentKind::BytedanceMiniProgram
                | EnvironmentKind::BaiduMiniProgram
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityGrade {
    Low,
    Medium,
    High,
}

/// Device capability hints (`spec.md` §4.5 rule 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvironmentCapabilities {
    pub kind: EnvironmentKind,
    pub memory_grade: CapabilityGrade,
    pub processor_grade: CapabilityGrade,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadPriority {
    Low,
    Normal,
    High,
}

pub struct ConfigAdvisor;

impl ConfigAdvisor {
    /// `(environmentCapabilities, fileSize, fileType?, priority?,
    /// latestPrediction) → UploadConfig` with the five ordered rules of
    /// `spec.md` §4.5.
    pub fn advise(
        capabilities: EnvironmentCapabilities,
        file_size: u64,
        _priority: Option<UploadPriority>,
        latest_quality: Option<NetworkQualityGrade>,
    ) -> UploadConfig {
        let mut config = Self::baseline_by_size(file_size);

        Self::apply_environment_clamp(&mut config, capabilities.kind);
        Self::apply_capability_clamp(&mut config, capabilities);
        if let Some(grade) = latest_quality {
            Self::apply_quality_adjustment(&mut config, grade);
        }

        config.clamp_to_absolute_bounds()
    }

    /// Rule 1: baseline by file size.
    fn baseline_by_size(file_size: u64) -> UploadConfig {
        const FIVE_MIB: u64 = 5 * 1024 * 1024;
        const HUNDRED_MIB: u64 = 100 * 1024 * 1024;

        let (chunk_mb, concurrency, use_worker) = if file_size < FIVE_MIB {
            (1, 2, false) // 512 KiB handled specially below
        } else if file_size <= HUNDRED_MIB {
            (2, 3, false)
        } else {
            (5, 3, true)
        };

        let chunk_size = if file_size < FIVE_MIB {
            ChunkSize::new(512 * 1024).unwrap_or_default()
        } else {
            ChunkSize::from_mb(chunk_mb).unwrap_or_default()
        };

        UploadConfig {
            chunk_size,
            concurrency: Concurrency::new(concurrency),
            use_worker,
            ..UploadConfig::default()
        }
    }

    /// Rule 2: environment clamp. Mini-program variants cap concurrency and
    /// chunk size and disable worker offload.
    fn apply_environment_clamp(config: &mut UploadConfig, kind: EnvironmentKind) {
        if kind.is_mini_program() {
            config.concurrency = Concurrency::new(config.concurrency.get().min(2));
            config.chunk_size = ChunkSize::new(config.chunk_size.bytes().min(2 * 1024 * 1024)).unwrap_or(config.chunk_size);
            config.use_worker = false;
        }
    }

    /// Rule 3: capability clamp by device memory/processor grade.
    fn apply_capability_clamp(config: &mut UploadConfig, capabilities: EnvironmentCapabilities) {
        if capabilities.memory_grade == CapabilityGrade::Low {
            config.chunk_size = ChunkSize::new(config.chunk_size.bytes().min(1024 * 1024)).unwrap_or(config.chunk_size);
            config.concurrency = Concurrency::new(config.concurrency.get().min(2));
        }
        if capabilities.processor_grade == CapabilityGrade::Low {
            config.concurrency = Concurrency::new(config.concurrency.get().min(2));
        }
    }

    /// Rule 4: quality adjustment from the latest Network Observer grade.
    fn apply_quality_adjustment(config: &mut UploadConfig, grade: NetworkQualityGrade) {
        match grade {
            NetworkQualityGrade::Excellent => {
                config.chunk_size = config.chunk_size.scaled(1.5);
                config.concurrency = config.concurrency.saturating_add(1);
                config.timeout_ms = (config.timeout_ms as f64 * 0.8) as u64;
            }
            NetworkQualityGrade::Good => {
                config.chunk_size = config.chunk_size.scaled(1.2);
            }
            NetworkQualityGrade::Fair => {}
            NetworkQualityGrade::Poor => {
                config.chunk_size = config.chunk_size.scaled(0.7);
                config.concurrency = config.concurrency.saturating_add(-1);
                config.timeout_ms = (config.timeout_ms as f64 * 1.5) as u64;
                config.retry_budget += 1;
            }
            NetworkQualityGrade::VeryPoor | NetworkQualityGrade::Unusable => {
                config.chunk_size = config.chunk_size.scaled(0.5);
                config.concurrency = Concurrency::new(1);
                config.timeout_ms *= 2;
                config.retry_budget += 2;
                config.retry_base_delay_ms = (config.retry_base_delay_ms as f64 * 1.5) as u64;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(kind: EnvironmentKind) -> EnvironmentCapabilities {
        EnvironmentCapabilities { kind, memory_grade: CapabilityGrade::High, processor_grade: CapabilityGrade::High }
    }

    #[test]
    fn small_file_baseline_is_512kb_two_workers() {
        let config = ConfigAdvisor::advise(caps(EnvironmentKind::StandardBrowser), 1_000_000, None, None);
        assert_eq!(config.chunk_size.bytes(), 512 * 1024);
        assert_eq!(config.concurrency.get(), 2);
        assert!(!config.use_worker);
    }

    #[test]
    fn huge_file_forces_worker_hash() {
        let config = ConfigAdvisor::advise(caps(EnvironmentKind::StandardBrowser), 200 * 1024 * 1024, None, None);
        assert!(config.use_worker);
        assert_eq!(config.chunk_size.bytes(), 5 * 1024 * 1024);
    }

    #[test]
    fn mini_program_clamps_concurrency_and_disables_worker() {
        let config = ConfigAdvisor::advise(caps(EnvironmentKind::WechatMiniProgram), 200 * 1024 * 1024, None, None);
        assert!(config.concurrency.get() <= 2);
        assert!(!config.use_worker);
        assert!(config.chunk_size.bytes() <= 2 * 1024 * 1024);
    }

    #[test]
    fn low_memory_clamps_chunk_size_and_concurrency() {
        let mut capabilities = caps(EnvironmentKind::StandardBrowser);
        capabilities.memory_grade = CapabilityGrade::Low;
        let config = ConfigAdvisor::advise(capabilities, 50 * 1024 * 1024, None, None);
        assert!(config.chunk_size.bytes() <= 1024 * 1024);
        assert!(config.concurrency.get() <= 2);
    }

    #[test]
    fn excellent_quality_increases_chunk_size_and_concurrency() {
        let baseline = ConfigAdvisor::advise(caps(EnvironmentKind::StandardBrowser), 50 * 1024 * 1024, None, None);
        let boosted =
            ConfigAdvisor::advise(caps(EnvironmentKind::StandardBrowser), 50 * 1024 * 1024, None, Some(NetworkQualityGrade::Excellent));
        assert!(boosted.chunk_size.bytes() >= baseline.chunk_size.bytes());
        assert!(boosted.concurrency.get() >= baseline.concurrency.get());
    }

    #[test]
    fn very_poor_quality_forces_single_concurrency() {
        let config = ConfigAdvisor::advise(
            caps(EnvironmentKind::StandardBrowser),
            50 * 1024 * 1024,
            None,
            Some(NetworkQualityGrade::VeryPoor),
        );
        assert_eq!(config.concurrency.get(), 1);
    }

    #[test]
    fn final_clamp_keeps_everything_in_absolute_bounds() {
        let config = ConfigAdvisor::advise(
            caps(EnvironmentKind::StandardBrowser),
            500 * 1024 * 1024,
            None,
            Some(NetworkQualityGrade::VeryPoor),
        );
        assert!(config.chunk_size.bytes() >= ChunkSize::MIN_SIZE);
        assert!(config.chunk_size.bytes() <= ChunkSize::MAX_SIZE);
        assert!(config.retry_budget <= UploadConfig::MAX_RETRY_BUDGET);
        assert!(config.timeout_ms <= UploadConfig::MAX_TIMEOUT_MS);
    }
}
