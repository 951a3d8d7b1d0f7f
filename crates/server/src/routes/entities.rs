//! Entity CRUD forwarded to the external test service.

use crate::error::{ServerError, ServerResult};
use crate::external::{TestEntityCreate, TestEntityUpdate};
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::state::ServerState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

/// Query for entity search
#[derive(Debug, Deserialize)]
pub struct EntitySearchQuery {
    pub name: String,
}

/// List every entity held by the external service
pub async fn list_entities(State(state): State<Arc<ServerState>>) -> ServerResult<impl IntoResponse> {
    Ok(Json(state.external.list_entities().await?))
}

/// Fetch one entity; an upstream 404 is passed through
pub async fn get_entity(
    State(state): State<Arc<ServerState>>,
    ApiPath(entity_id): ApiPath<i64>,
) -> ServerResult<impl IntoResponse> {
    Ok(Json(state.external.get_entity(entity_id).await?))
}

/// Validate locally, then create upstream (201)
pub async fn create_entity(
    State(state): State<Arc<ServerState>>,
    ApiJson(entity): ApiJson<TestEntityCreate>,
) -> ServerResult<impl IntoResponse> {
    entity.validate().map_err(ServerError::BadRequest)?;
    let created = state.external.create_entity(&entity).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Forward a partial update
pub async fn update_entity(
    State(state): State<Arc<ServerState>>,
    ApiPath(entity_id): ApiPath<i64>,
    ApiJson(entity): ApiJson<TestEntityUpdate>,
) -> ServerResult<impl IntoResponse> {
    entity.validate().map_err(ServerError::BadRequest)?;
    Ok(Json(state.external.update_entity(entity_id, &entity).await?))
}

/// Delete upstream and confirm with a message
pub async fn delete_entity(
    State(state): State<Arc<ServerState>>,
    ApiPath(entity_id): ApiPath<i64>,
) -> ServerResult<impl IntoResponse> {
    state.external.delete_entity(entity_id).await?;
    Ok(Json(json!({
        "message": format!("Entity {entity_id} deleted successfully"),
    })))
}

/// Search entities by name on the external service
pub async fn search_entities(
    State(state): State<Arc<ServerState>>,
    ApiQuery(query): ApiQuery<EntitySearchQuery>,
) -> ServerResult<impl IntoResponse> {
    Ok(Json(state.external.search_entities(&query.name).await?))
}
