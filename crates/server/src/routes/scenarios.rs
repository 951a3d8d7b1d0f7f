//! Load scenarios executed by the external test service.

use crate::error::{ServerError, ServerResult};
use crate::extract::ApiQuery;
use crate::state::ServerState;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;

const MAX_SCENARIO_SECS: u64 = 300;

/// Optional `seconds` query shared by the scenario endpoints
#[derive(Debug, Default, Deserialize)]
pub struct SecondsQuery {
    #[serde(default)]
    pub seconds: Option<u64>,
}

impl SecondsQuery {
    fn resolve(&self, default: u64) -> ServerResult<u64> {
        let seconds = self.seconds.unwrap_or(default);
        if seconds == 0 || seconds > MAX_SCENARIO_SECS {
            return Err(ServerError::BadRequest(format!(
                "seconds must be between 1 and {MAX_SCENARIO_SECS}"
            )));
        }
        Ok(seconds)
    }
}

/// Health of the external service itself
pub async fn health_check(State(state): State<Arc<ServerState>>) -> ServerResult<impl IntoResponse> {
    Ok(Json(state.external.health_check().await?))
}

/// Exhaust the external service's request thread pool
pub async fn block_thread(
    State(state): State<Arc<ServerState>>,
    ApiQuery(query): ApiQuery<SecondsQuery>,
) -> ServerResult<impl IntoResponse> {
    let seconds = query.resolve(30)?;
    Ok(Json(state.external.block_thread(seconds).await?))
}

/// Hang one external thread
pub async fn hang(
    State(state): State<Arc<ServerState>>,
    ApiQuery(query): ApiQuery<SecondsQuery>,
) -> ServerResult<impl IntoResponse> {
    let seconds = query.resolve(90)?;
    Ok(Json(state.external.hang_thread(seconds).await?))
}

/// Saturate external CPU for a while
pub async fn cpu_intensive(
    State(state): State<Arc<ServerState>>,
    ApiQuery(query): ApiQuery<SecondsQuery>,
) -> ServerResult<impl IntoResponse> {
    let seconds = query.resolve(10)?;
    Ok(Json(state.external.cpu_intensive(seconds).await?))
}

/// Thread pool snapshot reported by the external service
pub async fn thread_status(State(state): State<Arc<ServerState>>) -> ServerResult<impl IntoResponse> {
    Ok(Json(state.external.thread_status().await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seconds_default_and_bounds() {
        assert_eq!(SecondsQuery::default().resolve(30).unwrap(), 30);
        let zero = SecondsQuery { seconds: Some(0) };
        assert!(zero.resolve(30).is_err());
        let too_long = SecondsQuery { seconds: Some(301) };
        assert!(too_long.resolve(30).is_err());
    }
}
