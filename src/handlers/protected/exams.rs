// handlers/protected/exams.rs - Exams and recipient-scoped access

use axum::extract::rejection::JsonRejection;
use axum::extract::Path;
use axum::Json;
use serde_json::{json, Value};
use super::require_user_type;
use crate::database::Document;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser, TenantScope};
use crate::models::Exam;
use crate::services::exam_service;

/// GET /api/exams
pub async fn list(AuthUser(user): AuthUser, scope: TenantScope) -> ApiResult<Vec<Document>> {
    scope.authorize(&user)?;
    let store = scope.store().await?;
    let exams = exam_service::list(store.as_ref(), &user).await?;
    Ok(ApiResponse::success(exams))
}

/// POST /api/exams - School and teacher users
pub async fn create(
    AuthUser(user): AuthUser,
    scope: TenantScope,
    payload: Result<Json<Exam>, JsonRejection>,
) -> ApiResult<Document> {
    let Json(exam) = payload?;
    scope.authorize(&user)?;
    require_user_type(&user, &["school", "teacher"], "Only school or teacher users can create exams")?;
    exam.validate().map_err(ApiError::bad_request)?;

    let store = scope.store().await?;
    let doc = exam_service::create(store.as_ref(), &user, exam).await?;
    Ok(ApiResponse::created(doc))
}

/// GET /api/exams/:id - `id` is a document id or an exam code
pub async fn get(
    AuthUser(user): AuthUser,
    scope: TenantScope,
    Path(key): Path<String>,
) -> ApiResult<Document> {
    scope.authorize(&user)?;
    let store = scope.store().await?;
    let exam = exam_service::get(store.as_ref(), &user, &key).await?;
    Ok(ApiResponse::success(exam))
}

/// DELETE /api/exams/:id - School users only
pub async fn delete(
    AuthUser(user): AuthUser,
    scope: TenantScope,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    scope.authorize(&user)?;
    require_user_type(&user, &["school"], "Only school users can delete exams")?;

    let store = scope.store().await?;
    let deleted = exam_service::delete(store.as_ref(), &user.school_code, &id).await?;
    Ok(ApiResponse::success(json!({ "deletedCount": deleted })))
}
