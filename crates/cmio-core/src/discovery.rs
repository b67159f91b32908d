// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Startup discovery and the shared gateway handle.
//!
//! Discovery sweeps slave ids 1..=`max_slave` on the configured bus port.
//! Slaves that do not answer the probes are simply absent; failures are
//! expected and logged at debug only. The cycle scheduler starts only when
//! at least one card registered.

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::card::Card;
use crate::cycle::{start_cycle, CycleHandle};
use crate::manager::{IoConfig, IoManager, StateChangeCallback};

/// The live manager plus its cycle task, swapped wholesale by rediscover.
pub struct GatewayCore {
    /// The I/O manager front-ends talk to.
    pub manager: Arc<IoManager>,
    /// The running cycle, if discovery found any cards.
    pub cycle: Option<CycleHandle>,
}

/// Shared handle to the gateway core.
///
/// Rediscover takes the write lock, quiesces the old cycle, and swaps in a
/// fresh core; concurrent front-end requests briefly hold the read lock to
/// clone the manager handle.
pub type SharedGateway = Arc<RwLock<GatewayCore>>;

impl GatewayCore {
    /// Wraps the core in the shared handle.
    pub fn shared(self) -> SharedGateway {
        Arc::new(RwLock::new(self))
    }

    /// Stops the cycle task, waiting for the in-flight iteration.
    pub async fn shutdown(&mut self) {
        if let Some(cycle) = self.cycle.take() {
            cycle.stop().await;
        }
    }

    /// Tears the registry down and rebuilds it from a fresh bus sweep.
    ///
    /// The old cycle is stopped and awaited before the swap, so no stale
    /// scheduler keeps issuing reads against the replaced manager. Card ids
    /// are regenerated; consumers must not persist them across rediscoveries.
    pub async fn rediscover(
        &mut self,
        config: IoConfig,
        callback: Option<StateChangeCallback>,
    ) -> Vec<Card> {
        self.shutdown().await;

        let fresh = initialize(config).await;
        if let Some(callback) = callback {
            fresh.manager.set_state_change_callback(callback);
        }
        *self = fresh;

        self.manager.refresh_all().await
    }
}

impl std::fmt::Debug for GatewayCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayCore")
            .field("manager", &self.manager)
            .field("cycle_running", &self.cycle.is_some())
            .finish()
    }
}

/// Creates a manager, runs the discovery sweep, and starts the read-write
/// cycle when at least one card was found.
pub async fn initialize(config: IoConfig) -> GatewayCore {
    let port_path = config.port_path.clone();
    let max_slave = config.max_slave;
    let manager = Arc::new(IoManager::new(config));

    let mut discovered = 0usize;
    for slave in 1..=max_slave {
        match manager.add_card(&port_path, slave, None).await {
            Ok(card) => {
                tracing::info!(slave, port = %port_path, module = %card.module, "discovered expansion card");
                discovered += 1;
            }
            Err(e) => {
                tracing::debug!(slave, port = %port_path, error = %e, "no card at slave id");
            }
        }
    }

    let cycle = if discovered > 0 {
        tracing::info!(cards = discovered, "starting local I/O read-write cycle");
        Some(start_cycle(manager.clone()))
    } else {
        tracing::info!(port = %port_path, "no local I/O cards discovered; cycle not started");
        None
    };

    GatewayCore { manager, cycle }
}
