//! Operational endpoints in the style of Spring Boot actuators.

use crate::state::{ServerMetadata, ServerState};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;

/// Substrings that mark an environment variable as sensitive
const SENSITIVE_KEYS: &[&str] = &["password", "secret", "key", "token", "auth"];

const MASK: &str = "***HIDDEN***";

/// Delay between answering a restart request and starting shutdown
const RESTART_DELAY: Duration = Duration::from_secs(2);

/// Overall health with per-component detail
pub async fn health(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    let stats = state.store.stats();
    let block = state.simulator.block_status();

    Json(json!({
        "status": "UP",
        "components": {
            "store": {
                "status": if block.is_blocked() { "BLOCKED" } else { "UP" },
                "details": stats,
            },
            "simulation": block,
        }
    }))
}

/// Application, system and runtime information
pub async fn info(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    let metadata = ServerMetadata::from(state.as_ref());
    let runtime = tokio::runtime::Handle::current().metrics();

    Json(json!({
        "application": {
            "name": metadata.name,
            "version": metadata.version,
            "uptime_seconds": (state.uptime().as_secs_f64() * 100.0).round() / 100.0,
            "startup_time": metadata.started_at,
        },
        "system": {
            "os": std::env::consts::OS,
            "family": std::env::consts::FAMILY,
            "architecture": std::env::consts::ARCH,
            "hostname": std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string()),
            "available_parallelism": std::thread::available_parallelism().map(|n| n.get()).ok(),
        },
        "runtime": {
            "process_id": std::process::id(),
            "worker_threads": runtime.num_workers(),
            "alive_tasks": runtime.num_alive_tasks(),
        },
        "storage": state.store.stats(),
    }))
}

/// Environment variables with sensitive values masked
pub async fn env() -> impl IntoResponse {
    let mut vars = std::env::vars().collect::<Vec<_>>();
    vars.sort();

    Json(json!({
        "environment_variables": mask_env(vars),
        "working_directory": std::env::current_dir()
            .map(|dir| dir.display().to_string())
            .unwrap_or_else(|_| "unknown".to_string()),
        "user": std::env::var("USER").unwrap_or_else(|_| "Unknown".to_string()),
    }))
}

/// Runtime worker and lock contention details
pub async fn threads(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    let runtime = tokio::runtime::Handle::current().metrics();
    let stats = state.store.stats();
    let current = std::thread::current();

    Json(json!({
        "worker_threads": runtime.num_workers(),
        "alive_tasks": runtime.num_alive_tasks(),
        "current_thread": current.name().unwrap_or("unnamed"),
        "waiting_callers": stats.waiting_callers,
        "store_lock_available": stats.lock_available,
        "block": state.simulator.block_status(),
    }))
}

/// Begin a graceful shutdown shortly after answering; the process supervisor
/// is expected to start a fresh instance
pub async fn restart(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    tracing::warn!("application restart requested");

    let shutdown = Arc::clone(&state.shutdown);
    tokio::spawn(async move {
        tokio::time::sleep(RESTART_DELAY).await;
        tracing::info!("restart delay elapsed, shutting down");
        shutdown.notify_one();
    });

    Json(json!({
        "message": "Application restart initiated",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "note": format!("The application will shut down in {} seconds", RESTART_DELAY.as_secs()),
    }))
}

fn is_sensitive(name: &str) -> bool {
    let lower = name.to_lowercase();
    SENSITIVE_KEYS.iter().any(|key| lower.contains(key))
}

fn mask_env(vars: impl IntoIterator<Item = (String, String)>) -> Map<String, Value> {
    vars.into_iter()
        .map(|(name, value)| {
            let shown = if is_sensitive(&name) { MASK.to_string() } else { value };
            (name, Value::String(shown))
        })
        .collect()
}
