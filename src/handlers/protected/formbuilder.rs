// handlers/protected/formbuilder.rs - Form definitions and submissions

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app::AppState;
use crate::database::{DataMap, Document};
use crate::error::ApiError;
use crate::filter::{FilterOrder, SortDirection};
use crate::middleware::{ApiResponse, ApiResult, AuthUser, TenantScope};
use crate::models::Form;
use crate::services::form_service::{self, FormDeletion, FormListQuery, SubmissionContext};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub search: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionParams {
    pub form_id: Option<String>,
    pub user_id: Option<String>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    pub form_id: Option<String>,
    pub answers: Option<Value>,
    pub source: Option<String>,
}

fn header_text(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// First hop of `x-forwarded-for`, else `x-real-ip`
fn client_ip(headers: &HeaderMap) -> Option<String> {
    header_text(headers, "x-forwarded-for")
        .and_then(|list| list.split(',').next().map(|ip| ip.trim().to_string()))
        .filter(|ip| !ip.is_empty())
        .or_else(|| header_text(headers, "x-real-ip"))
}

/// GET /api/formbuilder - Active forms, paginated
pub async fn list(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    scope: TenantScope,
    params: Result<Query<ListParams>, QueryRejection>,
) -> ApiResult<Value> {
    let Query(params) = params?;
    scope.authorize(&user)?;

    let sort_by = params
        .sort_by
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("createdAt");
    let direction = params
        .sort_order
        .as_deref()
        .map(SortDirection::parse)
        .unwrap_or(SortDirection::Desc);
    let query = FormListQuery {
        page: params.page.unwrap_or(1).max(1),
        limit: state.config.page_size(params.limit),
        search: params.search,
        sort: FilterOrder::key(sort_by, direction)?,
    };

    let store = scope.store().await?;
    let page = form_service::list(store.as_ref(), &query).await?;
    Ok(ApiResponse::success(json!({
        "forms": page.items,
        "pagination": page.pagination,
    })))
}

/// POST /api/formbuilder - `{title, fields[]}`
pub async fn create(
    AuthUser(user): AuthUser,
    scope: TenantScope,
    payload: Result<Json<DataMap>, JsonRejection>,
) -> ApiResult<Document> {
    let Json(input) = payload?;
    scope.authorize(&user)?;
    let form = Form::from_input(input).map_err(ApiError::bad_request)?;

    let store = scope.store().await?;
    let doc = form_service::create(store.as_ref(), &user.username, form).await?;
    Ok(ApiResponse::created(doc))
}

/// GET /api/formbuilder/:id
pub async fn get(
    AuthUser(user): AuthUser,
    scope: TenantScope,
    Path(id): Path<String>,
) -> ApiResult<Document> {
    scope.authorize(&user)?;
    let store = scope.store().await?;
    let doc = form_service::get(store.as_ref(), &id).await?;
    Ok(ApiResponse::success(doc))
}

/// PUT /api/formbuilder/:id - Replace definition, bump version
pub async fn update(
    AuthUser(user): AuthUser,
    scope: TenantScope,
    Path(id): Path<String>,
    payload: Result<Json<DataMap>, JsonRejection>,
) -> ApiResult<Document> {
    let Json(input) = payload?;
    scope.authorize(&user)?;
    let form = Form::from_input(input).map_err(ApiError::bad_request)?;

    let store = scope.store().await?;
    let doc = form_service::update(store.as_ref(), &user.username, &id, form).await?;
    Ok(ApiResponse::success(doc))
}

/// DELETE /api/formbuilder/:id - Archive or delete
pub async fn delete(
    AuthUser(user): AuthUser,
    scope: TenantScope,
    Path(id): Path<String>,
) -> ApiResult<FormDeletion> {
    scope.authorize(&user)?;
    let store = scope.store().await?;
    let outcome = form_service::delete(store.as_ref(), &user.username, &id).await?;
    Ok(ApiResponse::success(outcome))
}

/// GET /api/formbuilder/submissions?formId=&userId=
pub async fn list_submissions(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    scope: TenantScope,
    params: Result<Query<SubmissionParams>, QueryRejection>,
) -> ApiResult<Value> {
    let Query(params) = params?;
    scope.authorize(&user)?;
    let form_id = params
        .form_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::missing("formId"))?;
    let page = params.page.unwrap_or(1).max(1);
    let limit = state.config.page_size(params.limit);

    let store = scope.store().await?;
    let result = form_service::list_submissions(
        store.as_ref(),
        form_id,
        params.user_id.as_deref(),
        page,
        limit,
    )
    .await?;
    Ok(ApiResponse::success(json!({
        "submissions": result.items,
        "pagination": result.pagination,
    })))
}

/// POST /api/formbuilder/submissions - `{formId, answers, source?}`
pub async fn submit(
    AuthUser(user): AuthUser,
    scope: TenantScope,
    headers: HeaderMap,
    payload: Result<Json<SubmitRequest>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(body) = payload?;
    scope.authorize(&user)?;
    let form_id = body
        .form_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::missing("formId"))?;
    let answers = match body.answers {
        Some(answers @ Value::Object(_)) => answers,
        Some(_) => return Err(ApiError::bad_request("answers must be an object")),
        None => return Err(ApiError::missing("answers")),
    };

    let context = SubmissionContext {
        username: user.username.clone(),
        source: body.source.filter(|s| !s.trim().is_empty()),
        user_agent: header_text(&headers, header::USER_AGENT.as_str()),
        ip_address: client_ip(&headers),
    };

    let store = scope.store().await?;
    let id = form_service::submit(store.as_ref(), form_id, answers, context).await?;
    Ok(ApiResponse::created(json!({ "submissionId": id })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn client_ip_prefers_first_forwarded_hop() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.9"));
        assert_eq!(client_ip(&headers).as_deref(), Some("10.0.0.9"));

        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        assert_eq!(client_ip(&headers).as_deref(), Some("203.0.113.7"));
    }
}
