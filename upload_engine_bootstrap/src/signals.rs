// Upload Engine
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.

//! # Signal Handling
//!
//! Listens for `SIGTERM`/`SIGINT` (and `SIGHUP` on Unix) and drives a
//! [`crate::shutdown::ShutdownCoordinator`] so in-flight uploads get a
//! chance to persist their resume state before the process exits.

use crate::shutdown::ShutdownCoordinator;
use tracing::info;

/// Spawns a task that waits for a termination signal and then calls
/// [`ShutdownCoordinator::initiate_shutdown`]. Returns the join handle so
/// the caller can await it as part of orderly shutdown.
pub fn install(coordinator: ShutdownCoordinator) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("shutdown signal received, initiating graceful shutdown");
        coordinator.initiate_shutdown();
    })
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    let mut sighup = signal(SignalKind::hangup()).expect("failed to install SIGHUP handler");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
        _ = sighup.recv() => {}
    }
}

#[cfg(windows)]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
