//! Client for the external Spring Boot test service.
//!
//! The `/api/entities` and `/api/test` routes are thin proxies: each call is a
//! single outbound request whose failures are mapped onto gateway-style
//! statuses (404 passthrough, 503 unreachable, 504 timeout).

use axum::http::StatusCode;
use opentelemetry_http::HeaderInjector;
use reqwest::header::HeaderMap;
use reqwest::{Client, Method, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::Instrument;
use tracing_opentelemetry::OpenTelemetrySpanExt;

use crate::config::ExternalConfig;

/// Failures talking to the external service
#[derive(Debug, thiserror::Error)]
pub enum ExternalError {
    #[error("External service timeout")]
    Timeout,

    #[error("External service unavailable: {0}")]
    Unavailable(String),

    #[error("Resource not found")]
    NotFound,

    #[error("External API error: {status} - {body}")]
    Upstream { status: u16, body: String },

    #[error("Invalid response from external service: {0}")]
    InvalidResponse(String),
}

impl ExternalError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ExternalError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ExternalError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ExternalError::NotFound => StatusCode::NOT_FOUND,
            ExternalError::Upstream { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            ExternalError::InvalidResponse(_) => StatusCode::BAD_GATEWAY,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ExternalError::Timeout => "EXTERNAL_TIMEOUT",
            ExternalError::Unavailable(_) => "EXTERNAL_UNAVAILABLE",
            ExternalError::NotFound => "NOT_FOUND",
            ExternalError::Upstream { .. } => "EXTERNAL_ERROR",
            ExternalError::InvalidResponse(_) => "EXTERNAL_INVALID_RESPONSE",
        }
    }
}

impl From<reqwest::Error> for ExternalError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ExternalError::Timeout
        } else if err.is_decode() {
            ExternalError::InvalidResponse(err.to_string())
        } else {
            ExternalError::Unavailable(err.to_string())
        }
    }
}

/// Entity record owned by the external service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestEntity {
    #[serde(default)]
    pub id: Option<i64>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, alias = "createdAt")]
    pub created_at: Option<String>,
    #[serde(default, alias = "updatedAt")]
    pub updated_at: Option<String>,
}

/// Payload for creating an external entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestEntityCreate {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Partial update for an external entity
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestEntityUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl TestEntityCreate {
    pub fn validate(&self) -> Result<(), String> {
        validate_entity_fields(Some(&self.name), self.description.as_deref())
    }
}

impl TestEntityUpdate {
    pub fn validate(&self) -> Result<(), String> {
        validate_entity_fields(self.name.as_deref(), self.description.as_deref())
    }
}

fn validate_entity_fields(name: Option<&str>, description: Option<&str>) -> Result<(), String> {
    if let Some(name) = name {
        let len = name.chars().count();
        if name.trim().is_empty() || len > 100 {
            return Err("name must be between 1 and 100 characters".to_string());
        }
    }
    if description.is_some_and(|d| d.chars().count() > 500) {
        return Err("description must be at most 500 characters".to_string());
    }
    Ok(())
}

/// W3C trace-context headers continuing `span`'s trace; empty when no
/// propagator is installed
pub(crate) fn trace_headers(span: &tracing::Span) -> HeaderMap {
    let mut headers = HeaderMap::new();
    let context = span.context();
    opentelemetry::global::get_text_map_propagator(|propagator| {
        propagator.inject_context(&context, &mut HeaderInjector(&mut headers));
    });
    headers
}

/// HTTP client for the Spring Boot test service
#[derive(Debug, Clone)]
pub struct SpringBootClient {
    http: Client,
    base_url: String,
}

impl SpringBootClient {
    pub fn new(config: &ExternalConfig) -> Result<Self, ExternalError> {
        let http = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|err| ExternalError::Unavailable(err.to_string()))?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        query: &[(&str, String)],
    ) -> Result<Response, ExternalError> {
        let url = format!("{}{}", self.base_url, path);
        let span = tracing::info_span!(
            "external_request",
            otel.kind = "client",
            http.request.method = %method,
            url.full = %url,
        );
        self.dispatch(method, url, body, query).instrument(span).await
    }

    async fn dispatch<B: Serialize + ?Sized>(
        &self,
        method: Method,
        url: String,
        body: Option<&B>,
        query: &[(&str, String)],
    ) -> Result<Response, ExternalError> {
        let mut request = self
            .http
            .request(method.clone(), &url)
            .headers(trace_headers(&tracing::Span::current()));
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|err| {
            let err = ExternalError::from(err);
            tracing::error!(%method, %url, error = %err, "external request failed");
            err
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ExternalError::NotFound);
        }
        if status.is_client_error() || status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(%method, %url, status = status.as_u16(), %body, "external API error");
            return Err(ExternalError::Upstream {
                status: status.as_u16(),
                body,
            });
        }
        tracing::debug!(%method, %url, status = status.as_u16(), "external request completed");
        Ok(response)
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ExternalError> {
        let response = self.send::<()>(method, path, None, query).await?;
        Ok(response.json().await?)
    }

    async fn submit<B: Serialize, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<T, ExternalError> {
        let response = self.send(method, path, Some(body), &[]).await?;
        Ok(response.json().await?)
    }

    // TestEntity CRUD

    pub async fn list_entities(&self) -> Result<Vec<TestEntity>, ExternalError> {
        self.fetch(Method::GET, "/api/entities", &[]).await
    }

    pub async fn get_entity(&self, id: i64) -> Result<TestEntity, ExternalError> {
        self.fetch(Method::GET, &format!("/api/entities/{id}"), &[])
            .await
    }

    pub async fn create_entity(&self, entity: &TestEntityCreate) -> Result<TestEntity, ExternalError> {
        self.submit(Method::POST, "/api/entities", entity).await
    }

    pub async fn update_entity(
        &self,
        id: i64,
        entity: &TestEntityUpdate,
    ) -> Result<TestEntity, ExternalError> {
        self.submit(Method::PUT, &format!("/api/entities/{id}"), entity)
            .await
    }

    pub async fn delete_entity(&self, id: i64) -> Result<(), ExternalError> {
        self.send::<()>(Method::DELETE, &format!("/api/entities/{id}"), None, &[])
            .await?;
        Ok(())
    }

    pub async fn search_entities(&self, name: &str) -> Result<Vec<TestEntity>, ExternalError> {
        self.fetch(
            Method::GET,
            "/api/entities/search",
            &[("name", name.to_string())],
        )
        .await
    }

    // Test scenarios

    pub async fn health_check(&self) -> Result<Value, ExternalError> {
        self.fetch(Method::GET, "/api/test/health", &[]).await
    }

    pub async fn block_thread(&self, seconds: u64) -> Result<Value, ExternalError> {
        self.scenario("/api/test/block-thread", seconds).await
    }

    pub async fn hang_thread(&self, seconds: u64) -> Result<Value, ExternalError> {
        self.scenario("/api/test/hang", seconds).await
    }

    pub async fn cpu_intensive(&self, seconds: u64) -> Result<Value, ExternalError> {
        self.scenario("/api/test/cpu-intensive", seconds).await
    }

    pub async fn thread_status(&self) -> Result<Value, ExternalError> {
        self.fetch(Method::GET, "/api/test/thread-status", &[]).await
    }

    async fn scenario(&self, path: &str, seconds: u64) -> Result<Value, ExternalError> {
        self.fetch(Method::POST, path, &[("seconds", seconds.to_string())])
            .await
    }
}
