use crate::error::ServerResult;
use crate::extract::{ApiPath, ApiQuery};
use crate::state::ServerState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use itemlab::{simulate_timeout, StoreError};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

/// Query for starting a block
#[derive(Debug, Default, Deserialize)]
pub struct BlockQuery {
    /// Seconds to hold the store lock; the configured default when absent
    #[serde(default)]
    pub duration_secs: Option<i64>,
}

fn positive_secs(value: i64) -> Result<u64, StoreError> {
    u64::try_from(value)
        .map_err(|_| StoreError::InvalidArgument(format!("duration must be positive, got {value}")))
}

/// Start holding the store lock from a background task
///
/// Answers 202 as soon as the lock is held; store requests issued afterwards
/// wait until the block ends.
pub async fn start_block(
    State(state): State<Arc<ServerState>>,
    ApiQuery(query): ApiQuery<BlockQuery>,
) -> ServerResult<impl IntoResponse> {
    let duration = query.duration_secs.map(positive_secs).transpose()?;
    let ticket = state.simulator.start_block(duration).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "message": "Blocking operation started",
            "block_id": ticket.block_id,
            "duration_seconds": ticket.duration_secs,
            "started_at": ticket.started_at,
        })),
    ))
}

/// Report whether a block is active, without waiting on the store lock
pub async fn block_status(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    Json(json!({
        "block": state.simulator.block_status(),
        "store": state.store.stats(),
    }))
}

/// Release an active block early
pub async fn cancel_block(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    let cancelled = state.simulator.cancel_block();
    Json(json!({
        "cancelled": cancelled,
        "message": if cancelled { "Block cancellation requested" } else { "No block in progress" },
    }))
}

/// Hold this request open for `duration` seconds
pub async fn timeout(
    State(state): State<Arc<ServerState>>,
    ApiPath(duration): ApiPath<i64>,
) -> ServerResult<impl IntoResponse> {
    let secs = positive_secs(duration)?;
    let report = simulate_timeout(secs, &state.config.simulation).await?;

    Ok(Json(json!({
        "message": "Operation completed after timeout",
        "requested_duration": report.requested_duration_secs,
        "actual_duration": report.actual_duration_secs,
        "completed_at": report.completed_at,
    })))
}
