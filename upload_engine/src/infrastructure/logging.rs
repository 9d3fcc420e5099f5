// /////////////////////////////////////////////////////////////////////////////
// Upload Engine
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Logging
//!
//! Structured logging setup via `tracing`/`tracing-subscriber`: an
//! `EnvFilter` driven by `RUST_LOG` (default `info`), human-readable output
//! for a terminal and JSON for anything else, matching the teacher's choice
//! of crates for observability without the alerting/health-scoring layer
//! this engine has no use for.

use tracing_subscriber::{fmt, EnvFilter};

/// Initializes the global `tracing` subscriber. Safe to call once per
/// process; a second call is a no-op (the underlying `set_global_default`
/// error is swallowed rather than propagated, since by the time a second
/// caller runs, logging is already configured).
pub fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(filter);
    let result = if json { subscriber.json().try_init() } else { subscriber.try_init() };
    if let Err(e) = result {
        tracing::debug!(%e, "tracing subscriber already initialized");
    }
}
