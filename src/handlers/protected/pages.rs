// handlers/protected/pages.rs - Content page administration

use axum::extract::rejection::JsonRejection;
use axum::extract::Path;
use axum::Json;
use serde_json::{json, Value};

use super::require_role;
use crate::database::Document;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser, TenantScope};
use crate::models::Page;
use crate::services::page_service;

pub async fn list(AuthUser(user): AuthUser, scope: TenantScope) -> ApiResult<Vec<Document>> {
    scope.authorize(&user)?;
    let store = scope.store().await?;
    let pages = page_service::list(store.as_ref()).await?;
    Ok(ApiResponse::success(pages))
}

pub async fn get(
    AuthUser(user): AuthUser,
    scope: TenantScope,
    Path(id): Path<String>,
) -> ApiResult<Document> {
    scope.authorize(&user)?;
    let store = scope.store().await?;
    let page = page_service::get(store.as_ref(), &id).await?;
    Ok(ApiResponse::success(page))
}

pub async fn create(
    AuthUser(user): AuthUser,
    scope: TenantScope,
    payload: Result<Json<Page>, JsonRejection>,
) -> ApiResult<Document> {
    let Json(mut page) = payload?;
    scope.authorize(&user)?;
    require_role(&user, "school")?;
    page.normalize().map_err(ApiError::bad_request)?;

    let store = scope.store().await?;
    let doc = page_service::create(store.as_ref(), page).await?;
    Ok(ApiResponse::created(doc))
}

pub async fn update(
    AuthUser(user): AuthUser,
    scope: TenantScope,
    Path(id): Path<String>,
    payload: Result<Json<Page>, JsonRejection>,
) -> ApiResult<Document> {
    let Json(mut page) = payload?;
    scope.authorize(&user)?;
    require_role(&user, "school")?;
    page.normalize().map_err(ApiError::bad_request)?;

    let store = scope.store().await?;
    let doc = page_service::update(store.as_ref(), &id, page).await?;
    Ok(ApiResponse::success(doc))
}

pub async fn delete(
    AuthUser(user): AuthUser,
    scope: TenantScope,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    scope.authorize(&user)?;
    require_role(&user, "school")?;

    let store = scope.store().await?;
    let deleted = page_service::delete(store.as_ref(), &id).await?;
    Ok(ApiResponse::success(json!({ "deletedCount": deleted })))
}
