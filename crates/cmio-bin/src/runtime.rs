// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Gateway runtime orchestration.
//!
//! Brings the daemon up in order: device config, bus discovery, TCP push
//! server, REST server; then waits for a termination signal and tears the
//! pieces down in reverse. The push server starts before the REST server so
//! the REST handlers always have a live connection flag to gate on.

use tracing::info;

use cmio_api::{ApiConfig, ApiServer, AppState};
use cmio_config::DeviceConfig;
use cmio_core::{initialize, IoConfig};
use cmio_push::{PushConfig, PushServer};

use crate::cli::{Cli, RunArgs};
use crate::error::{BinError, BinResult};
use crate::shutdown::ShutdownCoordinator;

/// The assembled gateway runtime.
pub struct GatewayRuntime {
    device_config: DeviceConfig,
    io_config: IoConfig,
    api_config: ApiConfig,
    push_config: PushConfig,
}

impl GatewayRuntime {
    /// Builds the runtime from CLI arguments and the persisted device
    /// config.
    pub fn from_args(cli: &Cli, args: &RunArgs) -> BinResult<Self> {
        let device_config = match &cli.config_dir {
            Some(dir) => cmio_config::load_or_init_at(&cmio_config::config_path_in(dir))?,
            None => cmio_config::load_or_init()?,
        };

        let io_config = IoConfig {
            port_path: args.port.clone(),
            max_slave: args.max_slave,
            serial: cmio_modbus::SerialSettings::default().with_baud_rate(args.baud),
            ..IoConfig::default()
        };

        let api_config = ApiConfig {
            port: args.http_port,
            ..ApiConfig::default()
        };

        let push_config = PushConfig {
            port: args.push_port,
            serve_externally: device_config.serve_externally,
            version: cmio_core::VERSION.to_string(),
        };

        Ok(Self {
            device_config,
            io_config,
            api_config,
            push_config,
        })
    }

    /// Runs the gateway until a termination signal arrives.
    pub async fn run(self) -> BinResult<()> {
        info!(
            version = cmio_core::VERSION,
            device_id = %self.device_config.device_id,
            port = %self.io_config.port_path,
            "starting CMIO gateway"
        );

        let shutdown = ShutdownCoordinator::new();

        // Bus discovery; the cycle starts inside when cards were found.
        let core = initialize(self.io_config.clone()).await.shared();

        // TCP push server.
        let push_server = PushServer::new(core.clone(), self.push_config.clone());
        let push_handle = push_server.handle();
        let push_signal = shutdown.signal();
        let push_task = tokio::spawn(async move {
            push_server.run(push_signal.wait()).await
        });

        // REST server.
        let state = AppState::new(core.clone(), self.io_config.clone(), push_handle);
        let api_server = ApiServer::new(state, self.api_config.clone());
        let api_signal = shutdown.signal();
        let api_task = tokio::spawn(async move {
            api_server.run_with_shutdown(api_signal.wait()).await
        });

        shutdown.wait_for_signals().await;
        info!("stopping CMIO gateway");

        // Quiesce the cycle before the listeners go away.
        core.write().await.shutdown().await;

        for (name, task) in [("push", push_task), ("api", api_task)] {
            match task.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => return Err(BinError::runtime(format!("{name} server: {e}"))),
                Err(e) => return Err(BinError::runtime(format!("{name} task: {e}"))),
            }
        }

        info!("CMIO gateway shutdown complete");
        Ok(())
    }
}
