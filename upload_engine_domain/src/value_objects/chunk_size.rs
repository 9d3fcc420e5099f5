// /////////////////////////////////////////////////////////////////////////////
// Upload Engine
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Chunk Size Value Object
//!
//! Type-safe representation of a single chunk's byte length, validated
//! against the absolute bounds the Config Advisor must respect after its
//! final clamp (`spec.md` §4.5 rule 5): 256 KiB to 10 MiB.

use crate::error::UploadError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChunkSize {
    bytes: usize,
}

impl ChunkSize {
    /// Absolute minimum chunk size: 256 KiB.
    pub const MIN_SIZE: usize = 256 * 1024;

    /// Absolute maximum chunk size: 10 MiB.
    pub const MAX_SIZE: usize = 10 * 1024 * 1024;

    /// Default chunk size used before any size-based baseline is applied.
    pub const DEFAULT_SIZE: usize = 2 * 1024 * 1024;

    pub fn new(bytes: usize) -> Result<Self, UploadError> {
        if bytes < Self::MIN_SIZE {
            return Err(UploadError::InvalidConfiguration(format!(
                "chunk size {} is below minimum of {} bytes",
                bytes,
                Self::MIN_SIZE
            )));
        }
        if bytes > Self::MAX_SIZE {
            return Err(UploadError::InvalidConfiguration(format!(
                "chunk size {} exceeds maximum of {} bytes",
                bytes,
                Self::MAX_SIZE
            )));
        }
        Ok(ChunkSize { bytes })
    }

    /// Like [`ChunkSize::new`] but clamps into bounds instead of failing.
    /// Used for the last chunk of a plan, which may be smaller than
    /// `MIN_SIZE`, and for the Config Advisor's final clamp step.
    pub fn clamped(bytes: usize) -> Self {
        ChunkSize {
            bytes: bytes.clamp(1, Self::MAX_SIZE),
        }
    }

    pub fn from_kb(kb: usize) -> Result<Self, UploadError> {
        Self::new(kb * 1024)
    }

    pub fn from_mb(mb: usize) -> Result<Self, UploadError> {
        Self::new(mb * 1024 * 1024)
    }

    pub fn bytes(&self) -> usize {
        self.bytes
    }

    pub fn kilobytes(&self) -> f64 {
        (self.bytes as f64) / 1024.0
    }

    pub fn megabytes(&self) -> f64 {
        (self.bytes as f64) / (1024.0 * 1024.0)
    }

    /// Scales this chunk size by a multiplier, clamping into the absolute
    /// bounds. Used by the Config Advisor's quality-adjustment rules
    /// (`chunkSize ×1.5`, `×0.7`, etc.).
    pub fn scaled(&self, factor: f64) -> Self {
        let scaled = ((self.bytes as f64) * factor).round() as usize;
        ChunkSize {
            bytes: scaled.clamp(Self::MIN_SIZE, Self::MAX_SIZE),
        }
    }
}

impl Default for ChunkSize {
    fn default() -> Self {
        ChunkSize { bytes: Self::DEFAULT_SIZE }
    }
}

impl std::fmt::Display for ChunkSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.bytes >= 1024 * 1024 {
            write!(f, "{:.1}MB", self.megabytes())
        } else {
            write!(f, "{:.1}KB", self.kilobytes())
        }
    }
}
