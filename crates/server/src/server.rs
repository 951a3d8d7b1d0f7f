//! Server initialization and routing
//!
//! This module handles the Axum server setup including:
//! - Router configuration with all API endpoints
//! - Middleware stack (metrics, logging, compression, etc.)
//! - Graceful shutdown handling

use crate::config::ServerConfig;
use crate::middleware::{log_requests, request_id, request_span, track_metrics};
use crate::routes::{actuator, entities, health, items, scenarios, simulation};
use crate::routes::{api_info, not_found};
use crate::state::ServerState;
use axum::body::Body;
use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::middleware::from_fn;
use axum::routing::{get, post, put};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Notify;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Build the Axum router with all routes and middleware
///
/// Routes are divided into:
/// - Service routes: /, /health, /ready, /metrics, /metadata
/// - Item routes: /items/* backed by the in-memory store
/// - Simulation routes: /simulate/*
/// - Actuator routes: /actuator/*
/// - External service proxy: /api/entities/*, /api/test/*
///
/// Middleware stack (outermost first):
/// 1. Tracing spans (parented on incoming `traceparent`)
/// 2. Request ID tracking
/// 3. Request logging
/// 4. CORS
/// 5. Compression
/// 6. Timeout handling
/// 7. Request metrics
/// 8. Body size limit
pub fn build_router(state: Arc<ServerState>) -> Router {
    // CORS layer
    let cors = if state.config.enable_cors {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        CorsLayer::new()
    };

    let service_routes = Router::new()
        .route("/", get(api_info))
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .route("/metrics", get(health::metrics))
        .route("/metadata", get(health::server_metadata));

    // Static segments take precedence over `{item_id}`
    let item_routes = Router::new()
        .route("/items", get(items::list_items).post(items::create_item))
        .route("/items/search", get(items::search_items))
        .route(
            "/items/bulk",
            post(items::create_items_bulk).delete(items::delete_items_bulk),
        )
        .route("/items/bulk-update", put(items::update_items_bulk))
        .route(
            "/items/{item_id}",
            get(items::get_item)
                .put(items::update_item)
                .delete(items::delete_item),
        );

    let simulation_routes = Router::new()
        .route(
            "/simulate/block",
            post(simulation::start_block).delete(simulation::cancel_block),
        )
        .route("/simulate/block/status", get(simulation::block_status))
        .route("/simulate/timeout/{duration}", get(simulation::timeout));

    let actuator_routes = Router::new()
        .route("/actuator/health", get(actuator::health))
        .route("/actuator/info", get(actuator::info))
        .route("/actuator/env", get(actuator::env))
        .route("/actuator/threads", get(actuator::threads))
        .route("/actuator/restart", post(actuator::restart));

    let external_routes = Router::new()
        .route(
            "/api/entities",
            get(entities::list_entities).post(entities::create_entity),
        )
        .route("/api/entities/search", get(entities::search_entities))
        .route(
            "/api/entities/{entity_id}",
            get(entities::get_entity)
                .put(entities::update_entity)
                .delete(entities::delete_entity),
        )
        .route("/api/test/health", get(scenarios::health_check))
        .route("/api/test/block-thread", post(scenarios::block_thread))
        .route("/api/test/hang", post(scenarios::hang))
        .route("/api/test/cpu-intensive", post(scenarios::cpu_intensive))
        .route("/api/test/thread-status", get(scenarios::thread_status));

    Router::new()
        .merge(service_routes)
        .merge(item_routes)
        .merge(simulation_routes)
        .merge(actuator_routes)
        .merge(external_routes)
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(state.config.max_body_size()))
        .layer(from_fn(track_metrics))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            state.config.timeout(),
        ))
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(from_fn(log_requests))
        .layer(from_fn(request_id))
        .layer(TraceLayer::new_for_http().make_span_with(request_span::<Body>))
        .with_state(state)
}

/// Start the itemlab HTTP server
///
/// Initializes logging and shared state from `config`, then serves until
/// Ctrl+C, SIGTERM or a restart request.
///
/// # Example
///
/// ```rust,no_run
/// use server::ServerConfig;
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let config = ServerConfig::load()?;
///     server::start_server(config).await?;
///     Ok(())
/// }
/// ```
pub async fn start_server(config: ServerConfig) -> anyhow::Result<()> {
    let _tracing = crate::telemetry::init_tracing(&config)?;
    config.validate()?;

    // Create server state
    let state = Arc::new(ServerState::new(config.clone())?);
    let restart = Arc::clone(&state.shutdown);

    let app = build_router(state);
    let addr: SocketAddr = config.socket_addr()?;

    tracing::info!(app = %config.app_name, %addr, "starting itemlab server");
    tracing::info!(
        "Timeout: {}s, Max body: {}MB",
        config.timeout_secs,
        config.max_body_size_mb
    );
    tracing::info!(
        "CORS: {}, Metrics: {}",
        config.enable_cors,
        config.metrics_enabled
    );
    tracing::info!(
        external = %config.external.base_url,
        max_block_secs = config.simulation.max_block_secs,
        max_timeout_secs = config.simulation.max_timeout_secs,
        "simulation limits"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(restart))
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C, SIGTERM, or when the restart endpoint fires `restart`
async fn shutdown_signal(restart: Arc<Notify>) {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down..."),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down..."),
        _ = restart.notified() => tracing::info!("Restart requested, shutting down..."),
    }
}
