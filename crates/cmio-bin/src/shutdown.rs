// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Graceful shutdown coordination.
//!
//! One coordinator per process: it handles SIGTERM/SIGINT and fans the
//! signal out to every component through a broadcast channel. Servers get a
//! [`ShutdownSignal`] future to use as their graceful-shutdown trigger.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::info;

// =============================================================================
// ShutdownCoordinator
// =============================================================================

/// Coordinates graceful shutdown across the gateway's components.
#[derive(Clone)]
pub struct ShutdownCoordinator {
    sender: broadcast::Sender<()>,
    initiated: Arc<AtomicBool>,
}

impl ShutdownCoordinator {
    /// Creates a new coordinator.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1);
        Self {
            sender,
            initiated: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Returns a future that resolves when shutdown is initiated.
    pub fn signal(&self) -> ShutdownSignal {
        ShutdownSignal {
            receiver: self.sender.subscribe(),
            initiated: self.initiated.clone(),
        }
    }

    /// Initiates shutdown; idempotent.
    pub fn initiate(&self) {
        if self
            .initiated
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            info!("shutdown initiated");
            let _ = self.sender.send(());
        }
    }

    /// Returns `true` once shutdown has been initiated.
    pub fn is_initiated(&self) -> bool {
        self.initiated.load(Ordering::SeqCst)
    }

    /// Blocks until an OS termination signal arrives, then initiates
    /// shutdown.
    pub async fn wait_for_signals(&self) {
        if self.is_initiated() {
            return;
        }

        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            let mut sigterm = match signal(SignalKind::terminate()) {
                Ok(stream) => stream,
                Err(e) => {
                    tracing::error!(error = %e, "failed to register SIGTERM handler");
                    return;
                }
            };
            let mut sigint = match signal(SignalKind::interrupt()) {
                Ok(stream) => stream,
                Err(e) => {
                    tracing::error!(error = %e, "failed to register SIGINT handler");
                    return;
                }
            };

            tokio::select! {
                _ = sigterm.recv() => info!("received SIGTERM"),
                _ = sigint.recv() => info!("received SIGINT"),
            }
        }

        #[cfg(not(unix))]
        {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("received Ctrl+C");
            }
        }

        self.initiate();
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// ShutdownSignal
// =============================================================================

/// A future that resolves once shutdown is initiated.
pub struct ShutdownSignal {
    receiver: broadcast::Receiver<()>,
    initiated: Arc<AtomicBool>,
}

impl ShutdownSignal {
    /// Waits for the shutdown notification.
    pub async fn wait(mut self) {
        if self.initiated.load(Ordering::SeqCst) {
            return;
        }
        let _ = self.receiver.recv().await;
    }
}

// =============================================================================
// Tests
// =============================================================================
