// /////////////////////////////////////////////////////////////////////////////
// Upload Engine
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! The file handed to the engine, immutable for the duration of an upload
//! (`spec.md` §3).

use crate::error::{UploadError, UploadResult};
use serde::{Deserialize, Serialize};

/// Opaque, adapter-owned reference to the underlying file. The core never
/// dereferences it; only a `HostAdapter` knows how to turn it into bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileHandle(String);

impl FileHandle {
    pub fn new(opaque_id: impl Into<String>) -> Self {
        FileHandle(opaque_id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    name: String,
    size: u64,
    mime_type: Option<String>,
    last_modified_millis: i64,
    handle: FileHandle,
}

impl FileDescriptor {
    pub fn new(
        name: impl Into<String>,
        size: u64,
        mime_type: Option<String>,
        last_modified_millis: i64,
        handle: FileHandle,
    ) -> UploadResult<Self> {
        if size == 0 {
            return Err(UploadError::Validation("file size must be greater than zero".into()));
        }
        Ok(FileDescriptor {
            name: name.into(),
            size,
            mime_type,
            last_modified_millis,
            handle,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn mime_type(&self) -> Option<&str> {
        self.mime_type.as_deref()
    }

    pub fn last_modified_millis(&self) -> i64 {
        self.last_modified_millis
    }

    pub fn handle(&self) -> &FileHandle {
        &self.handle
    }

    /// The `name|size|lastModifiedMillis` string fed into the metadata
    /// digest when a Fingerprint includes metadata.
    pub fn metadata_string(&self) -> String {
        format!("{}|{}|{}", self.name, self.size, self.last_modified_millis)
    }
}
