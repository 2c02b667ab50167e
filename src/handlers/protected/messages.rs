// handlers/protected/messages.rs - Internal messaging between users

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use super::require_user_type;
use crate::app::AppState;
use crate::database::Document;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser, TenantScope};
use crate::models::Message;
use crate::services::message_service::{self, InboxQuery, ReadState};

#[derive(Debug, Default, Deserialize)]
pub struct InboxParams {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub search: Option<String>,
    /// `read` or `unread`
    pub read: Option<String>,
    pub starred: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct ReplyRequest {
    pub message: Option<Message>,
}

/// GET /api/messages/inbox
pub async fn inbox(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    scope: TenantScope,
    params: Result<Query<InboxParams>, QueryRejection>,
) -> ApiResult<Value> {
    let Query(params) = params?;
    scope.authorize(&user)?;

    let read = match params.read.as_deref().map(str::trim) {
        None | Some("") | Some("all") => None,
        Some(raw) => Some(ReadState::parse(raw).ok_or_else(|| {
            ApiError::bad_request(format!("Invalid read filter: {} (expected read or unread)", raw))
        })?),
    };
    let query = InboxQuery {
        page: params.page.unwrap_or(1).max(1),
        limit: state.config.page_size(params.limit),
        search: params.search,
        read,
        starred: params.starred.unwrap_or(false),
    };

    let store = scope.store().await?;
    let page = message_service::inbox(store.as_ref(), &user.username, &query).await?;
    Ok(ApiResponse::success(json!({
        "messages": page.items,
        "pagination": page.pagination,
    })))
}

/// POST /api/messages/send - School and teacher users
pub async fn send(
    AuthUser(user): AuthUser,
    scope: TenantScope,
    payload: Result<Json<Message>, JsonRejection>,
) -> ApiResult<Document> {
    let Json(message) = payload?;
    scope.authorize(&user)?;
    require_user_type(&user, &["school", "teacher"], "Only school and teacher users can send messages")?;
    message.validate().map_err(ApiError::bad_request)?;

    let store = scope.store().await?;
    let doc = message_service::send(store.as_ref(), &user, message).await?;
    Ok(ApiResponse::created(doc))
}

/// POST /api/messages/reply - `{message: {...}}`
pub async fn reply(
    AuthUser(user): AuthUser,
    scope: TenantScope,
    payload: Result<Json<ReplyRequest>, JsonRejection>,
) -> ApiResult<Document> {
    let Json(body) = payload?;
    scope.authorize(&user)?;
    let message = body.message.ok_or_else(|| ApiError::missing("message"))?;
    message.validate().map_err(ApiError::bad_request)?;

    let store = scope.store().await?;
    let doc = message_service::reply(store.as_ref(), &user, message).await?;
    Ok(ApiResponse::created(doc))
}

/// PUT /api/messages/:id/read - Receiver only
pub async fn mark_read(
    AuthUser(user): AuthUser,
    scope: TenantScope,
    Path(id): Path<String>,
) -> ApiResult<Document> {
    scope.authorize(&user)?;
    let store = scope.store().await?;
    let doc = message_service::mark_read(store.as_ref(), &user.username, &id).await?;
    Ok(ApiResponse::success(doc))
}

/// DELETE /api/messages/:id - Receiver or sender
pub async fn delete(
    AuthUser(user): AuthUser,
    scope: TenantScope,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    scope.authorize(&user)?;
    let store = scope.store().await?;
    let deleted = message_service::delete(store.as_ref(), &user.username, &id).await?;
    Ok(ApiResponse::success(json!({ "deletedCount": deleted })))
}
