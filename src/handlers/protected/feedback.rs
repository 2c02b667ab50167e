// handlers/protected/feedback.rs - Product feedback, kept in the master database

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use super::require_user_type;
use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser, TenantScope};
use crate::services::feedback_service::{self, FeedbackInput};

#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<String>,
    pub phone: Option<String>,
}

impl FeedbackRequest {
    fn into_input(self) -> Result<FeedbackInput, ApiError> {
        fn field(value: Option<String>, name: &str) -> Result<String, ApiError> {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| ApiError::missing(name))
        }

        Ok(FeedbackInput {
            kind: field(self.kind, "type")?,
            title: field(self.title, "title")?,
            description: field(self.description, "description")?,
            priority: self.priority,
            phone: self.phone,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct FeedbackParams {
    pub status: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

/// POST /api/feedback - School and teacher users
pub async fn submit(
    AuthUser(user): AuthUser,
    scope: TenantScope,
    payload: Result<Json<FeedbackRequest>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(body) = payload?;
    scope.authorize(&user)?;
    require_user_type(&user, &["school", "teacher"], "Only school and teacher users can submit feedback")?;
    let input = body.into_input()?;

    let master = scope.master_store().await?;
    let id = feedback_service::submit(master.as_ref(), &user, &scope.domain, input).await?;
    Ok(ApiResponse::created(json!({ "feedbackId": id })))
}

/// GET /api/feedback?status=&type= - Newest entries from the caller's domain
pub async fn list(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    scope: TenantScope,
    params: Result<Query<FeedbackParams>, QueryRejection>,
) -> ApiResult<Value> {
    let Query(params) = params?;
    scope.authorize(&user)?;
    require_user_type(&user, &["school"], "Only school users can view feedback")?;

    let master = scope.master_store().await?;
    let feedback = feedback_service::list(
        master.as_ref(),
        &user,
        params.status.as_deref(),
        params.kind.as_deref(),
        state.config.api.feedback_list_limit,
    )
    .await?;
    Ok(ApiResponse::success(json!({ "feedback": feedback })))
}
