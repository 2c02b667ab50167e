// handlers/protected/mod.rs - Protected handlers (session required)
//
// Security Level: `AuthUser` extractor (cookie or Bearer token), then
// `TenantScope::authorize` binds the session to the request's tenant.
// Route Prefix: /api/*

use tracing::warn;

use crate::error::ApiError;
use crate::middleware::SessionUser;

pub mod auth; // GET /api/auth/me
pub mod classes; // /api/classes
pub mod courses; // /api/courses
pub mod crud; // /api/crud/:collection
pub mod dropdown; // /api/dropdown-options/:collection
pub mod exams; // /api/exams
pub mod feedback; // /api/feedback (master database)
pub mod formbuilder; // /api/formbuilder
pub mod messages; // /api/messages
pub mod pages; // /api/admin/pages

/// Gate on the session's `role` claim
pub(crate) fn require_role(user: &SessionUser, role: &str) -> Result<(), ApiError> {
    if user.role == role {
        return Ok(());
    }
    warn!("{} with role {} denied; {} required", user.username, user.role, role);
    Err(ApiError::forbidden(format!(
        "Only {} users can perform this action",
        role
    )))
}

/// Gate on the session's `userType` claim
pub(crate) fn require_user_type(user: &SessionUser, allowed: &[&str], message: &str) -> Result<(), ApiError> {
    if allowed.contains(&user.user_type.as_str()) {
        return Ok(());
    }
    warn!("{} ({}) denied: {}", user.username, user.user_type, message);
    Err(ApiError::forbidden(message))
}
