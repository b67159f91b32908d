// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Application state shared across handlers.

use cmio_core::{IoConfig, SharedGateway};
use cmio_push::PushHandle;

/// State handed to every handler via axum's state extraction.
///
/// `io_config` is kept so the rediscover endpoint can rebuild the registry
/// with the exact configuration the daemon started with, and `push` both
/// gates the mutating endpoints while the automation peer is attached and
/// supplies the state-change callback that must be re-registered on the
/// fresh manager after a rediscover.
#[derive(Clone)]
pub struct AppState {
    /// The shared gateway core (manager + cycle).
    pub core: SharedGateway,
    /// Configuration used to rebuild the core on rediscover.
    pub io_config: IoConfig,
    /// Handle onto the TCP push server.
    pub push: PushHandle,
}

impl AppState {
    /// Creates the handler state.
    pub fn new(core: SharedGateway, io_config: IoConfig, push: PushHandle) -> Self {
        Self {
            core,
            io_config,
            push,
        }
    }
}
