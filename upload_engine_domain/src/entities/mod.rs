// /////////////////////////////////////////////////////////////////////////////
// Upload Engine
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Entities with identity and lifecycle, as opposed to the immutable value
//! objects in `crate::value_objects`.

mod upload_task;

pub use upload_task::{TaskState, UploadTask};
