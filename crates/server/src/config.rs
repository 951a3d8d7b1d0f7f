use itemlab::{SimulationConfig, StoreConfig};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Service name reported by the info endpoints
    #[serde(default = "default_app_name")]
    pub app_name: String,

    /// Server bind address
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds. Must exceed the timeout simulation maximum,
    /// otherwise long simulations are cut off by the server itself.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Maximum request body size in MB
    #[serde(default = "default_max_body_size_mb")]
    pub max_body_size_mb: usize,

    /// Enable CORS
    #[serde(default = "default_true")]
    pub enable_cors: bool,

    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Metrics endpoint enabled
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,

    /// OTLP/HTTP collector base URL (e.g. `http://localhost:4318`). Spans are
    /// exported only when set; falls back to `OTEL_EXPORTER_OTLP_ENDPOINT`.
    #[serde(default)]
    pub otel_endpoint: Option<String>,

    /// Bearer token sent to the collector, if it requires one
    #[serde(default)]
    pub otel_auth_token: Option<String>,

    /// External test service proxied under /api
    #[serde(default)]
    pub external: ExternalConfig,

    /// Item store limits
    #[serde(default)]
    pub store: StoreConfig,

    /// Simulation bounds
    #[serde(default)]
    pub simulation: SimulationConfig,
}

/// Connection settings for the external Spring Boot test service
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExternalConfig {
    #[serde(default = "default_external_base_url")]
    pub base_url: String,

    #[serde(default = "default_external_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ExternalConfig {
    fn default() -> Self {
        Self {
            base_url: default_external_base_url(),
            timeout_secs: default_external_timeout_secs(),
        }
    }
}

impl ExternalConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
            bind_addr: default_bind_addr(),
            port: default_port(),
            timeout_secs: default_timeout_secs(),
            max_body_size_mb: default_max_body_size_mb(),
            enable_cors: default_true(),
            log_level: default_log_level(),
            metrics_enabled: default_true(),
            otel_endpoint: None,
            otel_auth_token: None,
            external: ExternalConfig::default(),
            store: StoreConfig::default(),
            simulation: SimulationConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from `.env`, an optional `server.*` file and
    /// `ITEMLAB__*` environment variables (e.g. `ITEMLAB__SIMULATION__MAX_BLOCK_SECS`).
    pub fn load() -> anyhow::Result<Self> {
        // A missing .env file is the normal case outside development.
        let _ = dotenvy::dotenv();

        let builder = config::Config::builder()
            // Load from file if exists
            .add_source(config::File::with_name("server").required(false))
            // Override with environment variables
            .add_source(
                config::Environment::with_prefix("ITEMLAB")
                    .separator("__")
                    .try_parsing(true),
            );

        let mut config: ServerConfig = builder.build()?.try_deserialize()?;
        config.otel_endpoint = resolve_otel_endpoint(
            config.otel_endpoint.take(),
            std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok(),
        );
        config.validate()?;
        Ok(config)
    }

    /// Check the nested limits and warn about settings that defeat the simulations
    pub fn validate(&self) -> anyhow::Result<()> {
        self.store.validate()?;
        self.simulation.validate()?;
        if self.timeout_secs <= self.simulation.max_timeout_secs {
            tracing::warn!(
                timeout_secs = self.timeout_secs,
                max_timeout_secs = self.simulation.max_timeout_secs,
                "request timeout does not exceed the timeout simulation maximum"
            );
        }
        Ok(())
    }

    /// Get the socket address to bind to
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        let addr_str = format!("{}:{}", self.bind_addr, self.port);
        Ok(addr_str.parse()?)
    }

    /// Get request timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Get max body size in bytes
    pub fn max_body_size(&self) -> usize {
        self.max_body_size_mb * 1024 * 1024
    }
}

/// The explicit setting wins; blank values count as unset.
fn resolve_otel_endpoint(configured: Option<String>, from_env: Option<String>) -> Option<String> {
    configured
        .or(from_env)
        .map(|endpoint| endpoint.trim().to_string())
        .filter(|endpoint| !endpoint.is_empty())
}

fn default_app_name() -> String {
    "itemlab".to_string()
}

fn default_bind_addr() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_timeout_secs() -> u64 {
    600
}

fn default_max_body_size_mb() -> usize {
    10
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_external_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_external_timeout_secs() -> u64 {
    30
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.port, 8000);
        assert_eq!(cfg.timeout_secs, 600);
        assert_eq!(cfg.max_body_size_mb, 10);
        assert!(cfg.enable_cors);
        assert!(cfg.metrics_enabled);
        assert_eq!(cfg.external.base_url, "http://localhost:8080");
        assert!(cfg.otel_endpoint.is_none());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_otel_endpoint_resolution() {
        assert_eq!(
            resolve_otel_endpoint(None, Some("http://collector:4318".into())).as_deref(),
            Some("http://collector:4318")
        );
        assert_eq!(
            resolve_otel_endpoint(Some("http://a:4318".into()), Some("http://b:4318".into()))
                .as_deref(),
            Some("http://a:4318")
        );
        assert!(resolve_otel_endpoint(None, Some("  ".into())).is_none());
        assert!(resolve_otel_endpoint(None, None).is_none());
    }

    #[test]
    fn test_socket_addr() {
        let cfg = ServerConfig::default();
        let addr = cfg.socket_addr().unwrap();
        assert_eq!(addr.port(), 8000);
    }

    #[test]
    fn test_nested_sections_default_independently() {
        let cfg: ServerConfig =
            serde_json::from_str(r#"{"port": 9000, "simulation": {"max_block_secs": 60}}"#)
                .unwrap();
        assert_eq!(cfg.port, 9000);
        assert_eq!(cfg.simulation.max_block_secs, 60);
        assert_eq!(cfg.simulation.max_timeout_secs, 300);
        assert_eq!(cfg.store.default_page_size, 100);
    }

    #[test]
    fn test_invalid_nested_limits_are_rejected() {
        let mut cfg = ServerConfig::default();
        cfg.simulation.default_block_secs = 0;
        assert!(cfg.validate().is_err());
    }
}
