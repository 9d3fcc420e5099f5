// /////////////////////////////////////////////////////////////////////////////
// Upload Engine
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Fingerprint Value Object
//!
//! A stable, content-derived identifier used both as a dedupe key and as the
//! Resume Ledger's lookup key. Composed of an algorithm tag, a content
//! digest (full or sampled), and an optional metadata digest
//! (`name|size|lastModifiedMillis`).
//!
//! Byte-identical files whose metadata is included produce identical
//! fingerprints; a changed file produces a different one with probability
//! `>= 1 - 2^-n` for an n-bit digest (`spec.md` §3).

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HashAlgorithm {
    Md5,
    Sha1,
    Sha256,
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            HashAlgorithm::Md5 => "md5",
            HashAlgorithm::Sha1 => "sha1",
            HashAlgorithm::Sha256 => "sha256",
        };
        write!(f, "{tag}")
    }
}

/// Full-file streaming digest, or head+tail sampled digest for large files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HashMode {
    Full,
    Quick,
}

/// Content-addressed identifier for one file.
///
/// Serializes to (and parses from) the wire form
/// `"<algorithm>:<digest_hex>[:<metadata_hex>]"`, which is also what is used
/// verbatim as the `X-File-Fingerprint` header and the Resume Ledger key
/// suffix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Fingerprint {
    algorithm: HashAlgorithm,
    digest: String,
    metadata_digest: Option<String>,
}

impl Fingerprint {
    pub fn new(algorithm: HashAlgorithm, digest: impl Into<String>, metadata_digest: Option<String>) -> Self {
        Fingerprint {
            algorithm,
            digest: digest.into(),
            metadata_digest,
        }
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    pub fn digest(&self) -> &str {
        &self.digest
    }

    pub fn metadata_digest(&self) -> Option<&str> {
        self.metadata_digest.as_deref()
    }

    /// The KV key suffix under the `upload:resume:` namespace (`spec.md`
    /// §4.6 / §6.5).
    pub fn as_key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.metadata_digest {
            Some(meta) => write!(f, "{}:{}:{}", self.algorithm, self.digest, meta),
            None => write!(f, "{}:{}", self.algorithm, self.digest),
        }
    }
}

impl From<Fingerprint> for String {
    fn from(fp: Fingerprint) -> Self {
        fp.to_string()
    }
}

impl std::str::FromStr for Fingerprint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, ':');
        let algorithm = match parts.next() {
            Some("md5") => HashAlgorithm::Md5,
            Some("sha1") => HashAlgorithm::Sha1,
            Some("sha256") => HashAlgorithm::Sha256,
            other => return Err(format!("unknown fingerprint algorithm tag: {other:?}")),
        };
        let digest = parts
            .next()
            .ok_or_else(|| "fingerprint missing digest".to_string())?
            .to_string();
        let metadata_digest = parts.next().map(|s| s.to_string());
        Ok(Fingerprint { algorithm, digest, metadata_digest })
    }
}

impl TryFrom<String> for Fingerprint {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
