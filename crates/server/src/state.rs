use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::external::SpringBootClient;
use chrono::{DateTime, Utc};
use itemlab::{BlockSimulator, ItemStore, StoreLock};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;

/// Shared application state
#[derive(Clone)]
pub struct ServerState {
    /// Server configuration
    pub config: Arc<ServerConfig>,

    /// Item store (shared across requests)
    pub store: ItemStore,

    /// Block simulator, serialized on the store's lock
    pub simulator: BlockSimulator,

    /// Client for the external test service
    pub external: SpringBootClient,

    /// Prometheus exposition handle, absent when metrics are disabled
    pub metrics: Option<PrometheusHandle>,

    /// Fired by the restart endpoint to begin graceful shutdown
    pub shutdown: Arc<Notify>,

    started_at: DateTime<Utc>,
    started_instant: Instant,
}

impl ServerState {
    /// Create new server state
    pub fn new(config: ServerConfig) -> ServerResult<Self> {
        let lock = StoreLock::new();
        let store = ItemStore::new(lock.clone(), config.store.clone());
        let simulator = BlockSimulator::new(lock, config.simulation.clone());

        let external = SpringBootClient::new(&config.external)
            .map_err(|err| ServerError::Config(format!("external client: {err}")))?;

        let metrics = if config.metrics_enabled {
            Some(crate::telemetry::prometheus_handle()?)
        } else {
            None
        };

        Ok(Self {
            config: Arc::new(config),
            store,
            simulator,
            external,
            metrics,
            shutdown: Arc::new(Notify::new()),
            started_at: Utc::now(),
            started_instant: Instant::now(),
        })
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn uptime(&self) -> Duration {
        self.started_instant.elapsed()
    }
}

/// Server metadata for health checks
#[derive(Debug, serde::Serialize)]
pub struct ServerMetadata {
    pub name: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub started_at: DateTime<Utc>,
}

impl From<&ServerState> for ServerMetadata {
    fn from(state: &ServerState) -> Self {
        Self {
            name: state.config.app_name.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: state.uptime().as_secs(),
            started_at: state.started_at,
        }
    }
}
