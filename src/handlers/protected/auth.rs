// handlers/protected/auth.rs - Session introspection

use crate::middleware::{ApiResponse, ApiResult, AuthUser, SessionUser};

/// GET /api/auth/me - The verified session record
pub async fn me(AuthUser(user): AuthUser) -> ApiResult<SessionUser> {
    Ok(ApiResponse::success(user))
}
