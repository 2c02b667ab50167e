// handlers/protected/courses.rs - School course catalogue

use axum::extract::rejection::JsonRejection;
use axum::extract::Path;
use axum::Json;
use serde_json::{json, Value};

use super::require_role;
use crate::error::ApiError;
use crate::database::Document;
use crate::middleware::{ApiResponse, ApiResult, AuthUser, TenantScope};
use crate::models::Course;
use crate::services::course_service;

/// GET /api/courses - Courses of the caller's school, by name
pub async fn list(AuthUser(user): AuthUser, scope: TenantScope) -> ApiResult<Vec<Document>> {
    scope.authorize(&user)?;
    let store = scope.store().await?;
    let courses = course_service::list(store.as_ref(), &user.school_code).await?;
    Ok(ApiResponse::success(courses))
}

/// POST /api/courses - School users only
pub async fn create(
    AuthUser(user): AuthUser,
    scope: TenantScope,
    payload: Result<Json<Course>, JsonRejection>,
) -> ApiResult<Document> {
    let Json(course) = payload?;
    scope.authorize(&user)?;
    require_role(&user, "school")?;
    course.validate().map_err(ApiError::bad_request)?;

    let store = scope.store().await?;
    let doc = course_service::create(store.as_ref(), &user.school_code, course).await?;
    Ok(ApiResponse::created(doc))
}

/// DELETE /api/courses/:id - School users only
pub async fn delete(
    AuthUser(user): AuthUser,
    scope: TenantScope,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    scope.authorize(&user)?;
    require_role(&user, "school")?;

    let store = scope.store().await?;
    let deleted = course_service::delete(store.as_ref(), &user.school_code, &id).await?;
    Ok(ApiResponse::success(json!({ "deletedCount": deleted })))
}
