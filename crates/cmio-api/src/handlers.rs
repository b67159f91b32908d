// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! REST handlers.
//!
//! These are thin adapters: they validate at the boundary, enqueue through
//! the manager facade, and answer from cached state. The cycle task owns
//! all scheduled bus traffic; the only handler that waits on the bus is
//! `reboot` (one frame) and `rediscover` (a full re-sweep).

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};

use cmio_core::{AoMode, Card};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

// =============================================================================
// Bodies & responses
// =============================================================================

/// `GET /api/local-io` response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardsResponse {
    /// Sorted card snapshot.
    pub cards: Vec<Card>,
    /// Whether the automation peer is attached.
    pub tcp_connected: bool,
}

/// `POST /api/local-io/rediscover` response.
#[derive(Debug, Serialize)]
pub struct RediscoverResponse {
    /// Cards found by the fresh sweep.
    pub cards: Vec<Card>,
}

/// Generic `{"status": "ok"}` acknowledgement.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// Always `"ok"`.
    pub status: &'static str,
}

impl StatusResponse {
    fn ok() -> Self {
        Self { status: "ok" }
    }
}

/// `write-do` request body.
#[derive(Debug, Deserialize)]
pub struct WriteDoBody {
    /// Digital output index.
    pub index: usize,
    /// Desired state.
    pub state: bool,
}

/// `write-ao` request body. The value is raw device units.
#[derive(Debug, Deserialize)]
pub struct WriteAoBody {
    /// Analog output index.
    pub index: usize,
    /// Desired value.
    pub value: f32,
}

/// `write-aotype` request body.
#[derive(Debug, Deserialize)]
pub struct WriteAoTypeBody {
    /// Analog output index.
    pub index: usize,
    /// `"0-10V"` or `"4-20mA"`.
    pub mode: String,
}

// =============================================================================
// Handlers
// =============================================================================

/// `GET /` - service identification.
pub async fn root() -> impl IntoResponse {
    Json(serde_json::json!({ "service": "cmio-gateway" }))
}

/// `GET /api/local-io` - cached card snapshot, no bus I/O.
pub async fn get_cards(State(state): State<AppState>) -> impl IntoResponse {
    let cards = state.core.read().await.manager.get_all_cards();
    Json(CardsResponse {
        cards,
        tcp_connected: state.push.is_connected(),
    })
}

/// `POST /api/local-io/rediscover` - quiesce the cycle, rebuild the
/// registry from a fresh bus sweep, and return the re-read cards.
pub async fn rediscover(State(state): State<AppState>) -> impl IntoResponse {
    tracing::info!("rediscover requested");
    let mut core = state.core.write().await;
    let cards = core
        .rediscover(state.io_config.clone(), Some(state.push.callback()))
        .await;
    Json(RediscoverResponse { cards })
}

/// `POST /api/local-io/{id}/write-do` - queue a digital output write.
pub async fn write_do(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<WriteDoBody>,
) -> ApiResult<Json<StatusResponse>> {
    ensure_controls_enabled(&state)?;
    let manager = state.core.read().await.manager.clone();
    manager.queue_write_do(&id, body.index, body.state)?;
    Ok(Json(StatusResponse::ok()))
}

/// `POST /api/local-io/{id}/write-ao` - queue an analog output write.
pub async fn write_ao(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<WriteAoBody>,
) -> ApiResult<Json<StatusResponse>> {
    ensure_controls_enabled(&state)?;
    let manager = state.core.read().await.manager.clone();
    manager.queue_write_ao(&id, body.index, body.value)?;
    Ok(Json(StatusResponse::ok()))
}

/// `POST /api/local-io/{id}/write-aotype` - queue an AO mode write.
pub async fn write_ao_type(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<WriteAoTypeBody>,
) -> ApiResult<Json<StatusResponse>> {
    ensure_controls_enabled(&state)?;
    let mode: AoMode = body
        .mode
        .parse()
        .map_err(|e: cmio_core::ParseAoModeError| ApiError::bad_request(e.to_string()))?;
    let manager = state.core.read().await.manager.clone();
    manager.queue_write_ao_type(&id, body.index, mode)?;
    Ok(Json(StatusResponse::ok()))
}

/// `POST /api/local-io/{id}/reboot` - send the reboot frame now.
pub async fn reboot(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<StatusResponse>> {
    ensure_controls_enabled(&state)?;
    let manager = state.core.read().await.manager.clone();
    manager.reboot_card(&id).await?;
    Ok(Json(StatusResponse::ok()))
}

/// While the automation peer is attached the operator UI is read-only; all
/// four mutating endpoints answer 503 without touching the queue.
fn ensure_controls_enabled(state: &AppState) -> ApiResult<()> {
    if state.push.is_connected() {
        return Err(ApiError::controls_disabled());
    }
    Ok(())
}
