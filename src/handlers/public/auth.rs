// handlers/public/auth.rs - Login and logout

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::app::AppState;
use crate::config::TenantDirectory;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser, TenantScope};
use crate::models::{required, AccountRole};
use crate::services::account_service;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub role: Option<String>,
    pub school_code: Option<String>,
    pub user_code: Option<String>,
    pub password: Option<String>,
    pub domain: Option<String>,
}

/**
 * POST /api/auth/login - Check credentials and start a session
 *
 * Input:
 * ```json
 * { "role": "student|teacher|school", "schoolCode": "2001",
 *   "userCode": "s100", "password": "...", "domain": "optional" }
 * ```
 *
 * Output: `{ token, user }`; the token is also set as an HttpOnly cookie.
 */
pub async fn login(
    State(state): State<AppState>,
    scope: TenantScope,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(body) = payload?;

    let role_name = required(&body.role, "role").map_err(ApiError::bad_request)?;
    let school_code = required(&body.school_code, "schoolCode").map_err(ApiError::bad_request)?;
    let user_code = required(&body.user_code, "userCode").map_err(ApiError::bad_request)?;
    let password = body
        .password
        .as_deref()
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ApiError::missing("password"))?;
    let role = AccountRole::parse(role_name)
        .ok_or_else(|| ApiError::bad_request(format!("Invalid role: {}", role_name)))?;

    // A domain in the body overrides the header
    let scope = match body.domain.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
        Some(domain) => TenantScope::new(domain, state.router.clone()),
        None => scope,
    };
    let domain = TenantDirectory::normalize_domain(&scope.domain)
        .ok_or_else(|| ApiError::bad_request("Invalid domain"))?;

    if !scope.is_known() {
        warn!("Login attempt for unknown domain {}", domain);
        return Err(ApiError::not_found("School domain not found"));
    }
    if let Some(pinned) = scope.pinned_school_code() {
        if pinned != school_code {
            warn!("Login to {} with school code {} (expected {})", domain, school_code, pinned);
            return Err(ApiError::bad_request("School code does not match this domain"));
        }
    }

    let store = scope.store().await?;
    let outcome = account_service::login(
        store.as_ref(),
        role,
        school_code,
        user_code,
        password,
        &domain,
        state.sessions.expiry_hours(),
    )
    .await?;

    let token = state.sessions.issue(&outcome.claims).map_err(|e| {
        error!("Failed to sign session token: {}", e);
        ApiError::internal_server_error("Failed to create session")
    })?;
    let cookie = state.sessions.session_cookie(&token);

    Ok(ApiResponse::success(json!({
        "token": token,
        "user": outcome.user,
    }))
    .with_cookie(cookie))
}

/// POST /api/auth/logout - Expire the session cookie
pub async fn logout(State(state): State<AppState>, CurrentUser(user): CurrentUser) -> ApiResponse<Value> {
    if let Some(user) = user {
        info!("{} logged out of {}", user.username, user.domain);
    }
    ApiResponse::success(json!({ "message": "Logged out" })).with_cookie(state.sessions.clear_cookie())
}
