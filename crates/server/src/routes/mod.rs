//! API route handlers
//!
//! Routes are organized by functionality:
//!
//! - `health`: Liveness, readiness, metrics and metadata
//! - `items`: Item CRUD, search and bulk operations over the in-memory store
//! - `simulation`: Store-lock blocking and request timeout simulations
//! - `actuator`: Operational info, environment, threads and restart
//! - `entities`: Proxy to the external service's entity CRUD
//! - `scenarios`: Proxy to the external service's load scenarios

pub mod actuator;
pub mod entities;
pub mod health;
pub mod items;
pub mod scenarios;
pub mod simulation;

use crate::error::{ServerError, ServerResult};
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

/// Service information and endpoint catalogue (GET /)
pub async fn api_info() -> ServerResult<impl IntoResponse> {
    Ok(Json(json!({
        "name": "itemlab",
        "version": env!("CARGO_PKG_VERSION"),
        "features": {
            "crud_operations": "Full CRUD operations",
            "bulk_operations": "Batch create, update, and delete",
            "search_filtering": "Search with multiple criteria",
            "thread_simulation": "Blocking and timeout scenarios",
        },
        "endpoints": {
            "items": {
                "crud": "/items",
                "bulk_create": "/items/bulk",
                "bulk_update": "/items/bulk-update",
                "bulk_delete": "/items/bulk?item_ids={id,...}",
                "search": "/items/search",
            },
            "simulation": {
                "block": "/simulate/block?duration_secs={n}",
                "block_status": "/simulate/block/status",
                "timeout": "/simulate/timeout/{duration}",
            },
            "actuator": {
                "health": "/actuator/health",
                "info": "/actuator/info",
                "env": "/actuator/env",
                "threads": "/actuator/threads",
                "restart": "/actuator/restart",
            },
            "entities": {
                "crud": "/api/entities",
                "get_by_id": "/api/entities/{id}",
                "search": "/api/entities/search?name={name}",
            },
            "test_scenarios": {
                "health": "/api/test/health",
                "block_thread": "/api/test/block-thread?seconds={n}",
                "hang": "/api/test/hang?seconds={n}",
                "cpu_intensive": "/api/test/cpu-intensive?seconds={n}",
                "thread_status": "/api/test/thread-status",
            },
            "health": "/health",
            "ready": "/ready",
            "metrics": "/metrics",
        }
    })))
}

/// 404 Not Found handler
///
/// Returns a standardized error response for undefined routes.
pub async fn not_found() -> ServerError {
    ServerError::NotFound
}
