// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! REST server: router assembly and serving.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use axum::{
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::handlers;
use crate::state::AppState;

/// Default REST port.
pub const DEFAULT_API_PORT: u16 = 9080;

// =============================================================================
// Configuration
// =============================================================================

/// REST server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Bind address.
    pub host: IpAddr,
    /// Listen port.
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_API_PORT,
        }
    }
}

impl ApiConfig {
    /// Returns the socket address to bind.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

// =============================================================================
// ApiServer
// =============================================================================

/// The REST front-end.
pub struct ApiServer {
    state: AppState,
    config: ApiConfig,
}

impl ApiServer {
    /// Creates the server.
    pub fn new(state: AppState, config: ApiConfig) -> Self {
        Self { state, config }
    }

    /// Builds the router with all routes and middleware.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/", get(handlers::root))
            .route("/api/local-io", get(handlers::get_cards))
            .route("/api/local-io/rediscover", post(handlers::rediscover))
            .route("/api/local-io/{id}/write-do", post(handlers::write_do))
            .route("/api/local-io/{id}/write-ao", post(handlers::write_ao))
            .route("/api/local-io/{id}/write-aotype", post(handlers::write_ao_type))
            .route("/api/local-io/{id}/reboot", post(handlers::reboot))
            .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
            .with_state(self.state.clone())
    }

    /// Runs the server until the shutdown future resolves.
    pub async fn run_with_shutdown(
        self,
        shutdown: impl std::future::Future<Output = ()> + Send + 'static,
    ) -> std::io::Result<()> {
        let addr = self.config.socket_addr();
        let router = self.router();

        info!(%addr, "REST server listening");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("REST server stopped");
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use cmio_core::{GatewayCore, IoConfig, IoManager, SharedGateway};
    use cmio_push::{PushConfig, PushServer};
    use std::sync::Arc;

    fn empty_core() -> SharedGateway {
        GatewayCore {
            manager: Arc::new(IoManager::new(IoConfig::default())),
            cycle: None,
        }
        .shared()
    }

    #[test]
    fn test_router_builds() {
        let core = empty_core();
        let push = PushServer::new(core.clone(), PushConfig::default());
        let state = AppState::new(core, IoConfig::default(), push.handle());
        let server = ApiServer::new(state, ApiConfig::default());
        let _router = server.router();
    }

    #[test]
    fn test_default_config() {
        let config = ApiConfig::default();
        assert_eq!(config.socket_addr().port(), 9080);
    }
}
