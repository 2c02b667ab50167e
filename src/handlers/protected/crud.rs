// handlers/protected/crud.rs - Generic collection CRUD
//
// Documents are stored as-is under `data`. Writes may carry the client's
// form structure so `isUnique`/`groupUniqueness` can be enforced server-side.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app::AppState;
use crate::database::{validate_collection, DataMap, Document};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser, TenantScope};
use crate::models::FormField;
use crate::services::crud_service;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    /// Free-text search over name, schoolCode, username and domain
    pub query: Option<String>,
    /// JSON object of field filters
    pub filters: Option<String>,
    pub limit: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteRequest {
    pub id: Option<String>,
    pub data: Option<DataMap>,
    #[serde(default)]
    pub form_structure: Vec<FormField>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteRequest {
    pub id: Option<String>,
}

fn required_id(id: &Option<String>) -> Result<&str, ApiError> {
    id.as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::missing("id"))
}

/// GET /api/crud/:collection - Search documents, newest first
pub async fn list(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    scope: TenantScope,
    Path(collection): Path<String>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> ApiResult<Vec<Document>> {
    let Query(query) = query?;
    scope.authorize(&user)?;
    validate_collection(&collection)?;

    let filters: Option<DataMap> = match query.filters.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => Some(map),
            _ => return Err(ApiError::bad_request("filters must be a JSON object")),
        },
    };
    let filter = crud_service::search_filter(query.query.as_deref(), filters.as_ref());
    let limit = state.config.page_size(query.limit.or(Some(state.config.api.max_page_size)));

    let store = scope.store().await?;
    let docs = crud_service::list(store.as_ref(), &collection, filter, limit).await?;
    Ok(ApiResponse::success(docs))
}

/// POST /api/crud/:collection - Insert `{data, formStructure}`
pub async fn create(
    AuthUser(user): AuthUser,
    scope: TenantScope,
    Path(collection): Path<String>,
    payload: Result<Json<WriteRequest>, JsonRejection>,
) -> ApiResult<Document> {
    let Json(body) = payload?;
    scope.authorize(&user)?;
    validate_collection(&collection)?;
    let data = body.data.ok_or_else(|| ApiError::missing("data"))?;

    let store = scope.store().await?;
    let doc = crud_service::create(store.as_ref(), &collection, data, &body.form_structure).await?;
    Ok(ApiResponse::created(doc))
}

/// PUT /api/crud/:collection - Replace `data` of `{id}`
pub async fn update(
    AuthUser(user): AuthUser,
    scope: TenantScope,
    Path(collection): Path<String>,
    payload: Result<Json<WriteRequest>, JsonRejection>,
) -> ApiResult<Document> {
    let Json(body) = payload?;
    scope.authorize(&user)?;
    validate_collection(&collection)?;
    let id = required_id(&body.id)?;
    let data = body.data.ok_or_else(|| ApiError::missing("data"))?;

    let store = scope.store().await?;
    let doc = crud_service::update(store.as_ref(), &collection, id, data, &body.form_structure).await?;
    Ok(ApiResponse::success(doc))
}

/// DELETE /api/crud/:collection - Delete `{id}`
pub async fn delete(
    AuthUser(user): AuthUser,
    scope: TenantScope,
    Path(collection): Path<String>,
    payload: Result<Json<DeleteRequest>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(body) = payload?;
    scope.authorize(&user)?;
    validate_collection(&collection)?;
    let id = required_id(&body.id)?;

    let store = scope.store().await?;
    let deleted = crud_service::delete(store.as_ref(), &collection, id).await?;
    Ok(ApiResponse::success(json!({ "deletedCount": deleted })))
}
