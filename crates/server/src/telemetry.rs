//! Logging, span export and metrics installation.

use std::collections::HashMap;

use anyhow::Context;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry::KeyValue;
use opentelemetry_otlp::{WithExportConfig, WithHttpConfig};
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::SdkTracerProvider;
use opentelemetry_sdk::Resource;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::ServerConfig;

const DURATION_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 300.0,
];

static PROMETHEUS: OnceCell<PrometheusHandle> = OnceCell::new();

/// Keeps the span exporter alive; flushes pending spans when dropped.
#[must_use = "dropping the guard stops span export"]
pub struct TracingGuard {
    provider: Option<SdkTracerProvider>,
}

impl TracingGuard {
    /// Whether spans are being exported to a collector
    pub fn is_exporting(&self) -> bool {
        self.provider.is_some()
    }
}

impl Drop for TracingGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.provider.take() {
            if let Err(err) = provider.shutdown() {
                tracing::warn!(error = %err, "failed to flush spans on shutdown");
            }
        }
    }
}

/// Install the JSON tracing subscriber filtered by `log_level` (any
/// `EnvFilter` directive, e.g. `info,server=debug`), plus an OpenTelemetry
/// layer exporting spans over OTLP/HTTP when `otel_endpoint` is set.
///
/// The W3C trace-context propagator is always installed so incoming
/// `traceparent` headers are honoured and forwarded to the external service.
pub fn init_tracing(config: &ServerConfig) -> anyhow::Result<TracingGuard> {
    opentelemetry::global::set_text_map_propagator(TraceContextPropagator::new());

    let provider = config
        .otel_endpoint
        .as_deref()
        .map(|endpoint| build_tracer_provider(config, endpoint))
        .transpose()?;
    let otel_layer = provider.as_ref().map(|provider| {
        tracing_opentelemetry::layer().with_tracer(provider.tracer(config.app_name.clone()))
    });

    let filter = EnvFilter::try_new(&config.log_level)
        .with_context(|| format!("invalid log level {:?}", config.log_level))?;
    let fmt_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_thread_ids(true)
        .with_thread_names(true);

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .with(otel_layer)
        .try_init();
    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }

    match (&provider, &config.otel_endpoint) {
        (Some(provider), Some(endpoint)) => {
            opentelemetry::global::set_tracer_provider(provider.clone());
            tracing::info!(%endpoint, "OTLP span export enabled");
        }
        _ => tracing::info!("OTLP span export disabled, no otel_endpoint configured"),
    }

    Ok(TracingGuard { provider })
}

fn build_tracer_provider(config: &ServerConfig, endpoint: &str) -> anyhow::Result<SdkTracerProvider> {
    let mut headers = HashMap::new();
    if let Some(token) = &config.otel_auth_token {
        headers.insert("Authorization".to_string(), format!("Bearer {token}"));
    }

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(traces_url(endpoint))
        .with_headers(headers)
        .build()
        .context("building OTLP span exporter")?;

    Ok(SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(service_resource(config))
        .build())
}

fn service_resource(config: &ServerConfig) -> Resource {
    Resource::builder()
        .with_service_name(config.app_name.clone())
        .with_attributes([
            KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
            KeyValue::new("service.instance.id", instance_id()),
        ])
        .build()
}

fn instance_id() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| format!("pid-{}", std::process::id()))
}

/// OTLP/HTTP wants the signal path on programmatic endpoints.
fn traces_url(endpoint: &str) -> String {
    let base = endpoint.trim_end_matches('/');
    if base.ends_with("/v1/traces") {
        base.to_string()
    } else {
        format!("{base}/v1/traces")
    }
}

/// Install the process-wide Prometheus recorder on first use and return a
/// handle for rendering the exposition text.
pub fn prometheus_handle() -> anyhow::Result<PrometheusHandle> {
    PROMETHEUS
        .get_or_try_init(|| {
            let handle = PrometheusBuilder::new()
                .set_buckets_for_metric(
                    Matcher::Full("http_request_duration_seconds".to_string()),
                    DURATION_BUCKETS,
                )?
                .install_recorder()?;
            tracing::info!("prometheus recorder installed");
            Ok::<_, anyhow::Error>(handle)
        })
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry::{Key, Value};

    #[test]
    fn traces_path_is_appended_once() {
        assert_eq!(traces_url("http://collector:4318"), "http://collector:4318/v1/traces");
        assert_eq!(traces_url("http://collector:4318/"), "http://collector:4318/v1/traces");
        assert_eq!(
            traces_url("http://collector:4318/v1/traces"),
            "http://collector:4318/v1/traces"
        );
    }

    #[test]
    fn resource_identifies_the_service() {
        let resource = service_resource(&ServerConfig::default());
        assert_eq!(
            resource.get(&Key::new("service.name")),
            Some(Value::from("itemlab"))
        );
        assert_eq!(
            resource.get(&Key::new("service.version")),
            Some(Value::from(env!("CARGO_PKG_VERSION")))
        );
        assert!(resource.get(&Key::new("service.instance.id")).is_some());
    }

    #[test]
    fn exporter_builds_without_a_reachable_collector() {
        let config = ServerConfig {
            otel_auth_token: Some("secret".into()),
            ..ServerConfig::default()
        };
        let provider = build_tracer_provider(&config, "http://127.0.0.1:4318").unwrap();
        let guard = TracingGuard {
            provider: Some(provider),
        };
        assert!(guard.is_exporting());
    }
}
