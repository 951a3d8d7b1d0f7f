use crate::error::ServerResult;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::state::ServerState;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use itemlab::{BulkOutcome, Item, ItemPatch, NewItem, SearchFilter};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

/// Pagination query for listing items
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    /// Number of items to skip; negative values count as 0
    #[serde(default)]
    pub skip: Option<i64>,

    /// Page size; defaults to the configured page size
    #[serde(default)]
    pub limit: Option<i64>,
}

/// Query parameters for item search
#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    /// Substring matched against name or description
    #[serde(default)]
    pub query: Option<String>,

    #[serde(default)]
    pub min_price: Option<f64>,

    #[serde(default)]
    pub max_price: Option<f64>,

    #[serde(default)]
    pub in_stock: Option<bool>,

    /// Tags as repeated keys (`tags=a&tags=b`) or comma lists (`tags=a,b`);
    /// an item matches when it carries any of them
    #[serde(default)]
    pub tags: Vec<String>,
}

impl From<SearchQuery> for SearchFilter {
    fn from(query: SearchQuery) -> Self {
        SearchFilter {
            query: query.query,
            min_price: query.min_price,
            max_price: query.max_price,
            in_stock: query.in_stock,
            tags: split_list(&query.tags),
        }
    }
}

/// Request to create several items at once
#[derive(Debug, Deserialize)]
pub struct BulkCreateRequest {
    pub items: Vec<NewItem>,
}

/// One entry of a bulk update: the id plus the fields to change
#[derive(Debug, Deserialize)]
pub struct BulkUpdateEntry {
    pub id: String,
    #[serde(flatten)]
    pub patch: ItemPatch,
}

/// Request to update several items at once
#[derive(Debug, Deserialize)]
pub struct BulkUpdateRequest {
    pub updates: Vec<BulkUpdateEntry>,
}

/// Query for bulk deletion
#[derive(Debug, Default, Deserialize)]
pub struct BulkDeleteQuery {
    /// Item ids as repeated keys or comma lists
    #[serde(default)]
    pub item_ids: Vec<String>,
}

/// Response for the partial-success bulk operations
#[derive(Debug, Serialize)]
pub struct BulkResponse {
    pub message: String,
    pub succeeded_count: usize,
    pub failed_count: usize,
    #[serde(flatten)]
    pub outcome: BulkOutcome<Item>,
}

impl BulkResponse {
    fn new(message: &str, outcome: BulkOutcome<Item>) -> Self {
        Self {
            message: message.to_string(),
            succeeded_count: outcome.succeeded.len(),
            failed_count: outcome.failed.len(),
            outcome,
        }
    }
}

fn split_list(values: &[String]) -> Vec<String> {
    values
        .iter()
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

fn clamp_non_negative(value: i64) -> usize {
    usize::try_from(value.max(0)).unwrap_or(usize::MAX)
}

/// Create a new item
pub async fn create_item(
    State(state): State<Arc<ServerState>>,
    ApiJson(item): ApiJson<NewItem>,
) -> ServerResult<impl IntoResponse> {
    let item = state.store.create(item).await?;
    Ok(Json(item))
}

/// Create several items; all or nothing
pub async fn create_items_bulk(
    State(state): State<Arc<ServerState>>,
    ApiJson(request): ApiJson<BulkCreateRequest>,
) -> ServerResult<impl IntoResponse> {
    let items = state.store.bulk_create(request.items).await?;
    Ok(Json(items))
}

/// List items with offset/limit pagination
pub async fn list_items(
    State(state): State<Arc<ServerState>>,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> ServerResult<impl IntoResponse> {
    let skip = query.skip.map(clamp_non_negative).unwrap_or(0);
    let limit = query.limit.map(clamp_non_negative);
    Ok(Json(state.store.list(skip, limit).await))
}

/// Search items
pub async fn search_items(
    State(state): State<Arc<ServerState>>,
    ApiQuery(query): ApiQuery<SearchQuery>,
) -> ServerResult<impl IntoResponse> {
    let filter = SearchFilter::from(query);
    let results = state.store.search(&filter).await?;
    Ok(Json(results))
}

/// Get an item by id
pub async fn get_item(
    State(state): State<Arc<ServerState>>,
    ApiPath(item_id): ApiPath<String>,
) -> ServerResult<impl IntoResponse> {
    Ok(Json(state.store.get(&item_id).await?))
}

/// Merge the provided fields into an item
pub async fn update_item(
    State(state): State<Arc<ServerState>>,
    ApiPath(item_id): ApiPath<String>,
    ApiJson(patch): ApiJson<ItemPatch>,
) -> ServerResult<impl IntoResponse> {
    Ok(Json(state.store.update(&item_id, patch).await?))
}

/// Update several items; missing ids are reported, not fatal
pub async fn update_items_bulk(
    State(state): State<Arc<ServerState>>,
    ApiJson(request): ApiJson<BulkUpdateRequest>,
) -> ServerResult<impl IntoResponse> {
    let updates = request
        .updates
        .into_iter()
        .map(|entry| (entry.id, entry.patch))
        .collect();
    let outcome = state.store.bulk_update(updates).await?;
    Ok(Json(BulkResponse::new("Bulk update completed", outcome)))
}

/// Delete an item
pub async fn delete_item(
    State(state): State<Arc<ServerState>>,
    ApiPath(item_id): ApiPath<String>,
) -> ServerResult<impl IntoResponse> {
    let item = state.store.delete(&item_id).await?;
    Ok(Json(json!({
        "message": format!("Item {item_id} deleted successfully"),
        "item": item,
    })))
}

/// Delete several items; missing ids are reported, not fatal
pub async fn delete_items_bulk(
    State(state): State<Arc<ServerState>>,
    ApiQuery(query): ApiQuery<BulkDeleteQuery>,
) -> ServerResult<impl IntoResponse> {
    let ids = split_list(&query.item_ids);
    let outcome = state.store.bulk_delete(ids).await?;
    Ok(Json(BulkResponse::new("Bulk delete completed", outcome)))
}
