use crate::error::{ServerError, ServerResult};
use crate::state::{ServerMetadata, ServerState};
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;
use std::sync::Arc;

/// Health check endpoint (liveness)
/// Returns 200 if server is running
pub async fn health_check(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": state.config.app_name,
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": state.uptime().as_secs(),
    }))
}

/// Readiness check endpoint
///
/// Stays 200 during a simulated block; the store component reports `blocked`
/// so probes can tell a deliberate stall from an outage.
pub async fn readiness_check(
    State(state): State<Arc<ServerState>>,
) -> ServerResult<impl IntoResponse> {
    let store_status = if state.simulator.is_blocked() {
        "blocked"
    } else {
        "ready"
    };

    Ok(Json(json!({
        "status": "ready",
        "service": state.config.app_name,
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": state.uptime().as_secs(),
        "components": {
            "api": "ready",
            "store": store_status,
        }
    })))
}

/// Prometheus metrics endpoint
pub async fn metrics(State(state): State<Arc<ServerState>>) -> ServerResult<impl IntoResponse> {
    let handle = state.metrics.as_ref().ok_or(ServerError::NotFound)?;
    Ok((
        [(CONTENT_TYPE, "text/plain; version=0.0.4")],
        handle.render(),
    ))
}

/// Server metadata endpoint
pub async fn server_metadata(
    State(state): State<Arc<ServerState>>,
) -> ServerResult<impl IntoResponse> {
    let metadata = ServerMetadata::from(state.as_ref());
    Ok(Json(serde_json::to_value(metadata)?))
}
