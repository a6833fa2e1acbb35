//! Health check endpoints.
//!
//! - `/livez` - Basic liveness probe (immediate 200, no checks)
//! - `/health` - Service lifecycle and the state of the schedule snapshot

use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{service::Lifecycle, state::AppState};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub lifecycle: Lifecycle,
    /// `connected` once a snapshot has been loaded from the source.
    pub source: &'static str,
    pub version: Option<u64>,
    pub fetched_at: Option<DateTime<Utc>>,
    /// Fetch cycles started since the process came up.
    pub refreshes: u64,
}

/// GET /livez - Basic liveness probe.
///
/// Returns 200 immediately. Used to check if the server is accepting connections.
#[axum::debug_handler]
pub async fn livez() -> StatusCode {
    StatusCode::OK
}

/// GET /health - Passive service status. Never triggers a refresh.
#[axum::debug_handler]
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let snapshot = state.service.current();

    Json(HealthResponse {
        status: "healthy",
        lifecycle: state.service.lifecycle(),
        source: if snapshot.is_some() {
            "connected"
        } else {
            "disconnected"
        },
        version: snapshot.as_ref().map(|s| s.version),
        fetched_at: snapshot.as_ref().map(|s| s.fetched_at),
        refreshes: state.service.refreshes_started(),
    })
}
