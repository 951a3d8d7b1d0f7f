//! itemlab server - HTTP test target for load and resilience tooling
//!
//! This crate exposes the `itemlab` item store over a REST API together with
//! deliberate failure modes that exercise clients, proxies and monitors:
//!
//! - **Items**: CRUD, search and bulk operations on an in-memory store
//! - **Simulation**: Hold the store lock for a while, or answer slowly
//! - **Actuator**: Health, info, masked environment, threads and restart
//! - **External proxy**: Forward entity CRUD and load scenarios to a
//!   downstream test service
//! - **Health & Metrics**: Liveness/readiness probes and Prometheus metrics
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use server::ServerConfig;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ServerConfig::load()?;
//!     server::start_server(config).await?;
//!     Ok(())
//! }
//! ```
//!
//! # API Endpoints
//!
//! - `GET /` - API information
//! - `GET /health`, `GET /ready` - Probes
//! - `GET /metrics` - Prometheus metrics
//! - `GET|POST /items`, `GET|PUT|DELETE /items/{item_id}`
//! - `GET /items/search` - Filter by text, price, stock and tags
//! - `POST|DELETE /items/bulk`, `PUT /items/bulk-update`
//! - `POST|DELETE /simulate/block`, `GET /simulate/block/status`
//! - `GET /simulate/timeout/{duration}`
//! - `GET /actuator/{health,info,env,threads}`, `POST /actuator/restart`
//! - `/api/entities/*`, `/api/test/*` - External service proxy

pub mod config;
pub mod error;
pub mod external;
pub mod extract;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;
pub mod telemetry;

pub use config::{ExternalConfig, ServerConfig};
pub use error::{ServerError, ServerResult};
pub use server::{build_router, start_server};
pub use state::ServerState;
