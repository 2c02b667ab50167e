use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use std::sync::Arc;
use tracing::warn;

use super::session::SessionUser;
use crate::app::AppState;
use crate::config::TenantDirectory;
use crate::database::{ConnectionRouter, DocumentStore};
use crate::error::ApiError;

pub const DOMAIN_HEADER: &str = "x-domain";

/// Tenant addressed by the request: `x-domain` header or the default domain.
///
/// The store is opened lazily so handlers can reject bad input before any
/// connection work.
pub struct TenantScope {
    pub domain: String,
    router: Arc<ConnectionRouter>,
}

impl TenantScope {
    pub fn new(domain: impl Into<String>, router: Arc<ConnectionRouter>) -> Self {
        Self {
            domain: domain.into(),
            router,
        }
    }

    pub async fn store(&self) -> Result<Arc<dyn DocumentStore>, ApiError> {
        let conn = self.router.resolve(&self.domain).await?;
        Ok(conn.handle.clone())
    }

    /// Master database, shared by all tenants
    pub async fn master_store(&self) -> Result<Arc<dyn DocumentStore>, ApiError> {
        let conn = self.router.resolve_master().await?;
        Ok(conn.handle.clone())
    }

    /// School code the tenant directory pins for this domain, if any
    pub fn pinned_school_code(&self) -> Option<&str> {
        self.router
            .directory()
            .entry(&self.domain)
            .and_then(|entry| entry.school_code.as_deref())
    }

    /// Whether the domain is listed in a non-empty tenant directory
    pub fn is_known(&self) -> bool {
        let directory = self.router.directory();
        directory.domains().is_empty() || directory.entry(&self.domain).is_some()
    }

    /// The session must belong to this tenant (and its pinned school)
    pub fn authorize(&self, user: &SessionUser) -> Result<(), ApiError> {
        let request_domain = TenantDirectory::normalize_domain(&self.domain);
        let session_domain = TenantDirectory::normalize_domain(&user.domain);
        if request_domain.is_none() || request_domain != session_domain {
            warn!(
                "Session for {} used against tenant {} by {}",
                user.domain, self.domain, user.username
            );
            return Err(ApiError::forbidden("Access denied for this domain"));
        }

        if let Some(school_code) = self.pinned_school_code() {
            if school_code != user.school_code {
                warn!(
                    "School code {} does not match tenant {} ({})",
                    user.school_code, self.domain, school_code
                );
                return Err(ApiError::forbidden("School code mismatch"));
            }
        }

        Ok(())
    }
}

#[async_trait]
impl FromRequestParts<AppState> for TenantScope {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let domain = match parts.headers.get(DOMAIN_HEADER) {
            Some(value) => value
                .to_str()
                .map_err(|_| ApiError::bad_request("Invalid x-domain header"))?
                .trim()
                .to_string(),
            None => String::new(),
        };
        let domain = if domain.is_empty() {
            state.config.server.default_domain.clone()
        } else {
            domain
        };

        Ok(TenantScope::new(domain, state.router.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TenantEntry;
    use crate::database::MemoryConnector;
    use std::collections::HashMap;

    fn user(domain: &str, school_code: &str) -> SessionUser {
        SessionUser {
            id: "u1".into(),
            username: "admin".into(),
            role: "school".into(),
            user_type: "school".into(),
            school_code: school_code.into(),
            domain: domain.into(),
            name: None,
            class_codes: vec![],
            groups: vec![],
        }
    }

    fn router() -> Arc<ConnectionRouter> {
        let mut entries = HashMap::new();
        entries.insert(
            "school-a.test".to_string(),
            TenantEntry {
                school_code: Some("2001".into()),
                ..Default::default()
            },
        );
        Arc::new(ConnectionRouter::new(
            TenantDirectory::with_entries(entries, None),
            Arc::new(MemoryConnector::new()),
            "masterdb",
        ))
    }

    #[test]
    fn authorizes_matching_session() {
        let scope = TenantScope::new("School-A.test", router());
        assert!(scope.authorize(&user("school-a.test", "2001")).is_ok());
    }

    #[test]
    fn rejects_other_domain_or_school() {
        let scope = TenantScope::new("school-a.test", router());
        let err = scope.authorize(&user("school-b.test", "2001")).unwrap_err();
        assert_eq!(err.status_code(), 403);
        let err = scope.authorize(&user("school-a.test", "9999")).unwrap_err();
        assert_eq!(err.status_code(), 403);
    }

    #[test]
    fn unpinned_domain_accepts_any_school_code() {
        let scope = TenantScope::new("other.test", router());
        assert!(scope.authorize(&user("other.test", "1")).is_ok());
        assert!(!scope.is_known());
    }
}
