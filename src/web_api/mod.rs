//! WebAPI - HTTP and WebSocket Endpoints
//!
//! ## Responsibilities
//!
//! - Viewer WebSocket (`/api/ws`, and `/` for the bundled UI)
//! - Registry read endpoints (JSON list, single record, TSV export)
//! - Health / status

mod routes;

pub use routes::create_router;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;

use crate::models::{HealthResponse, StatusResponse};
use crate::registry_store::ItemStatus;
use crate::state::AppState;

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Status endpoint
pub async fn server_status(State(state): State<AppState>) -> impl IntoResponse {
    let records = state.registry.store.snapshot().await;
    let checked_out = records
        .iter()
        .filter(|r| r.status == ItemStatus::CheckedOut)
        .count();

    Json(StatusResponse {
        service: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        viewers: state.registry.hub.connection_count(),
        records: records.len(),
        checked_out,
    })
}
