// /////////////////////////////////////////////////////////////////////////////
// Upload Engine
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Hash Engine
//!
//! Computes a content-addressed [`Fingerprint`] without materializing the
//! whole file in memory (`spec.md` §4.2).
//!
//! ## Architecture Note - Sync Core, Async Orchestration
//!
//! The digest update itself (`StreamingHasher`) is CPU-bound business logic
//! and stays synchronous, following the same split the teacher's checksum
//! service uses: domain services that only touch bytes already in hand are
//! sync; only the orchestration that awaits `HostAdapter::read_slice`
//! between digest updates is async. An infrastructure adapter is expected to
//! drive `StreamingHasher` inside `tokio::task::spawn_blocking` when digest
//! cost is large enough to matter, the same way the teacher's
//! `AsyncChecksumAdapter` wraps its sync `ChecksumService`.

use crate::error::{UploadError, UploadResult};
use crate::value_objects::{Fingerprint, HashAlgorithm, HashMode};
use md5::{Digest as _, Md5};
use sha1::Sha1;
use sha2::Sha256;

/// Default full-read chunk size: 2 MiB (`spec.md` §4.2).
pub const DEFAULT_READ_SIZE: usize = 2 * 1024 * 1024;

/// Default head/tail sample size: 512 KiB, capped at `size/2`.
pub const DEFAULT_SAMPLE_SIZE: usize = 512 * 1024;

/// Files larger than this default to [`HashMode::Quick`].
pub const DEFAULT_QUICK_THRESHOLD: u64 = 100 * 1024 * 1024;

enum Inner {
    Md5(Box<Md5>),
    Sha1(Box<Sha1>),
    Sha256(Box<Sha256>),
}

/// Incremental digest state. CPU-bound and synchronous: callers feed it
/// slices as they become available and finalize once at the end.
pub struct StreamingHasher {
    algorithm: HashAlgorithm,
    inner: Inner,
}

impl StreamingHasher {
    pub fn new(algorithm: HashAlgorithm) -> Self {
        let inner = match algorithm {
            HashAlgorithm::Md5 => Inner::Md5(Box::new(Md5::new())),
            HashAlgorithm::Sha1 => Inner::Sha1(Box::new(Sha1::new())),
            HashAlgorithm::Sha256 => Inner::Sha256(Box::new(Sha256::new())),
        };
        StreamingHasher { algorithm, inner }
    }

    pub fn update(&mut self, bytes: &[u8]) {
        match &mut self.inner {
            Inner::Md5(h) => h.update(bytes),
            Inner::Sha1(h) => h.update(bytes),
            Inner::Sha256(h) => h.update(bytes),
        }
    }

    pub fn finalize_hex(self) -> String {
        match self.inner {
            Inner::Md5(h) => hex::encode(h.finalize()),
            Inner::Sha1(h) => hex::encode(h.finalize()),
            Inner::Sha256(h) => hex::encode(h.finalize()),
        }
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }
}

/// Inputs to a fingerprint computation (`spec.md` §4.2 contract).
#[derive(Debug, Clone)]
pub struct HashRequest {
    pub algorithm: HashAlgorithm,
    pub mode: HashMode,
    pub sample_size: usize,
    pub include_metadata: bool,
}

impl HashRequest {
    /// Picks [`HashMode::Quick`] once `file_size` exceeds
    /// [`DEFAULT_QUICK_THRESHOLD`], otherwise [`HashMode::Full`].
    pub fn by_size_policy(file_size: u64, algorithm: HashAlgorithm, include_metadata: bool) -> Self {
        let mode = if file_size > DEFAULT_QUICK_THRESHOLD { HashMode::Quick } else { HashMode::Full };
        HashRequest { algorithm, mode, sample_size: DEFAULT_SAMPLE_SIZE, include_metadata }
    }
}

/// Plans the byte ranges a [`HashRequest`] needs read from the file, given
/// its size. Pure and deterministic, so orchestration code can compute the
/// read plan once and then just await `HostAdapter::read_slice` for each
/// range plus feed a [`StreamingHasher`] in order.
pub fn plan_read_ranges(file_size: u64, request: &HashRequest) -> Vec<(u64, u64)> {
    match request.mode {
        HashMode::Full => {
            let read_size = DEFAULT_READ_SIZE as u64;
            let mut ranges = Vec::new();
            let mut offset = 0u64;
            while offset < file_size {
                let length = read_size.min(file_size - offset);
                ranges.push((offset, length));
                offset += length;
            }
            ranges
        }
        HashMode::Quick => {
            let sample = (request.sample_size as u64).min(file_size / 2).max(1);
            let head = (0u64, sample.min(file_size));
            if file_size <= sample {
                vec![head]
            } else {
                let tail = (file_size - sample, sample);
                vec![head, tail]
            }
        }
    }
}

/// Finalizes a fingerprint from a completed [`StreamingHasher`], appending
/// the disambiguating size suffix for [`HashMode::Quick`] and the optional
/// metadata digest (`spec.md` §4.2, §3).
pub fn finalize_fingerprint(
    hasher: StreamingHasher,
    request: &HashRequest,
    file_size: u64,
    metadata_string: Option<&str>,
) -> UploadResult<Fingerprint> {
    let algorithm = hasher.algorithm();
    let mut digest = hasher.finalize_hex();
    if matches!(request.mode, HashMode::Quick) {
        digest = format!("{digest}:{file_size}");
    }
    let metadata_digest = match (request.include_metadata, metadata_string) {
        (true, Some(meta)) => Some(hex_digest_of(algorithm, meta.as_bytes())),
        (true, None) => {
            return Err(UploadError::Validation(
                "include_metadata requested but no metadata string was supplied".into(),
            ));
        }
        (false, _) => None,
    };
    Ok(Fingerprint::new(algorithm, digest, metadata_digest))
}

fn hex_digest_of(algorithm: HashAlgorithm, bytes: &[u8]) -> String {
    let mut hasher = StreamingHasher::new(algorithm);
    hasher.update(bytes);
    hasher.finalize_hex()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_bytes_produce_same_digest() {
        let mut a = StreamingHasher::new(HashAlgorithm::Sha256);
        a.update(b"hello ");
        a.update(b"world");
        let mut b = StreamingHasher::new(HashAlgorithm::Sha256);
        b.update(b"hello world");
        assert_eq!(a.finalize_hex(), b.finalize_hex());
    }

    #[test]
    fn md5_is_available_without_a_platform_crypto_dependency() {
        let mut h = StreamingHasher::new(HashAlgorithm::Md5);
        h.update(b"abc");
        assert_eq!(h.finalize_hex(), "900150983cd24fb0d6963f7d28e17f72");
    }

    #[test]
    fn full_mode_plans_contiguous_reads_covering_the_file() {
        let request = HashRequest::by_size_policy(5 * 1024 * 1024, HashAlgorithm::Sha256, false);
        let ranges = plan_read_ranges(5 * 1024 * 1024, &request);
        let total: u64 = ranges.iter().map(|(_, len)| len).sum();
        assert_eq!(total, 5 * 1024 * 1024);
    }

    #[test]
    fn quick_mode_samples_head_and_tail_only() {
        let big = 200 * 1024 * 1024;
        let request = HashRequest::by_size_policy(big, HashAlgorithm::Sha256, false);
        assert_eq!(request.mode, HashMode::Quick);
        let ranges = plan_read_ranges(big, &request);
        assert_eq!(ranges.len(), 2);
        assert_eq!(ranges[0], (0, DEFAULT_SAMPLE_SIZE as u64));
        assert_eq!(ranges[1].1, DEFAULT_SAMPLE_SIZE as u64);
    }

    #[test]
    fn quick_mode_sample_capped_at_half_file_size_for_small_files() {
        let small = 10_000u64;
        let request = HashRequest { algorithm: HashAlgorithm::Sha256, mode: HashMode::Quick, sample_size: 512 * 1024, include_metadata: false };
        let ranges = plan_read_ranges(small, &request);
        assert_eq!(ranges[0].1, small / 2);
    }
}
