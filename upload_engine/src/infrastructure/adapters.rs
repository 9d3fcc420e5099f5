// /////////////////////////////////////////////////////////////////////////////
// Upload Engine
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Adapters
//!
//! Concrete implementations of the domain's `HostAdapter` port plus the
//! orchestration helpers built on top of it: HTTP transport, file slicing,
//! KV-backed persistence, and fingerprint computation.

pub mod hashing;
pub mod kv_store;
pub mod local_adapter;

pub use kv_store::{InMemoryKv, KvStore, SqliteKv};
pub use local_adapter::{CancellationAbortToken, LocalAdapter};
