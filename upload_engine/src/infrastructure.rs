// /////////////////////////////////////////////////////////////////////////////
// Upload Engine
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Infrastructure Layer
//!
//! Concrete implementations of the domain's ports: the host adapter, the
//! persistence-backed resume ledger, the chunk scheduler, and the runtime
//! plumbing (configuration, logging) that wires them together.
//!
//! ## Module Structure
//!
//! - `adapters` - `HostAdapter` implementations and fingerprint orchestration
//! - `runtime` - scheduler, resume ledger, network observer loop
//! - `config` - settings loading
//! - `logging` - tracing initialization
//!
//! Everything here depends on `upload_engine_domain`; nothing in that crate
//! depends back.

pub mod adapters;
pub mod config;
pub mod logging;
pub mod runtime;

pub use config::EngineSettings;
pub use logging::init_logging;
