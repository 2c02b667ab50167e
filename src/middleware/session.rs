use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use crate::app::AppState;
use crate::auth::{self, Claims, JwtError};
use crate::config::SecurityConfig;
use crate::error::ApiError;

/// Verified caller, decoded from the session token
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub id: String,
    pub username: String,
    pub role: String,
    pub user_type: String,
    pub school_code: String,
    pub domain: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub class_codes: Vec<String>,
    pub groups: Vec<String>,
}

impl From<Claims> for SessionUser {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.user_id,
            username: claims.username,
            role: claims.role,
            user_type: claims.user_type,
            school_code: claims.school_code,
            domain: claims.domain,
            name: claims.name,
            class_codes: claims.class_codes,
            groups: claims.groups,
        }
    }
}

/// Turns the session cookie (or a Bearer header) into a `SessionUser`
#[derive(Clone)]
pub struct SessionResolver {
    secret: Arc<str>,
    cookie_name: Arc<str>,
    expiry_hours: u64,
    secure: bool,
}

impl SessionResolver {
    pub fn new(secret: &str, cookie_name: &str, expiry_hours: u64, secure: bool) -> Self {
        Self {
            secret: Arc::from(secret),
            cookie_name: Arc::from(cookie_name),
            expiry_hours,
            secure,
        }
    }

    pub fn from_config(security: &SecurityConfig) -> Self {
        Self::new(
            &security.jwt_secret,
            &security.session_cookie_name,
            security.jwt_expiry_hours,
            security.session_cookie_secure,
        )
    }

    pub fn expiry_hours(&self) -> u64 {
        self.expiry_hours
    }

    /// `None` when the token is absent, malformed, forged or expired
    pub fn current_user(&self, headers: &HeaderMap) -> Option<SessionUser> {
        let token = self.token_from_headers(headers)?;
        match auth::verify_jwt(&token, &self.secret) {
            Ok(claims) => Some(claims.into()),
            Err(e) => {
                debug!("Rejected session token: {}", e);
                None
            }
        }
    }

    /// Cookie first, then `Authorization: Bearer`
    pub fn token_from_headers(&self, headers: &HeaderMap) -> Option<String> {
        extract_cookie(headers, &self.cookie_name).or_else(|| extract_bearer(headers))
    }

    pub fn issue(&self, claims: &Claims) -> Result<String, JwtError> {
        auth::generate_jwt(claims, &self.secret)
    }

    /// `Set-Cookie` value carrying a fresh token
    pub fn session_cookie(&self, token: &str) -> String {
        let mut cookie = format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
            self.cookie_name,
            token,
            self.expiry_hours * 3600
        );
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }

    /// `Set-Cookie` value that expires the session
    pub fn clear_cookie(&self) -> String {
        let mut cookie = format!(
            "{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0",
            self.cookie_name
        );
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }
}

fn extract_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn extract_bearer(headers: &HeaderMap) -> Option<String> {
    let auth_str = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = auth_str.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then(|| token.to_string())
}

/// Optional session; never rejects
pub struct CurrentUser(pub Option<SessionUser>);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(CurrentUser(state.sessions.current_user(&parts.headers)))
    }
}

/// Required session; rejects with 401
pub struct AuthUser(pub SessionUser);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        state
            .sessions
            .current_user(&parts.headers)
            .map(AuthUser)
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn resolver() -> SessionResolver {
        SessionResolver::new("test-secret", "auth-token", 1, false)
    }

    fn token(resolver: &SessionResolver) -> String {
        let claims = Claims::new("u1", "localhost:3000", "2001", "school", "admin", 1);
        resolver.issue(&claims).unwrap()
    }

    #[test]
    fn reads_token_from_cookie() {
        let resolver = resolver();
        let mut headers = HeaderMap::new();
        let cookie = format!("theme=dark; auth-token={}", token(&resolver));
        headers.insert(header::COOKIE, HeaderValue::from_str(&cookie).unwrap());
        let user = resolver.current_user(&headers).unwrap();
        assert_eq!(user.username, "admin");
        assert_eq!(user.role, "school");
        assert_eq!(user.user_type, "school");
    }

    #[test]
    fn falls_back_to_bearer() {
        let resolver = resolver();
        let mut headers = HeaderMap::new();
        let bearer = format!("Bearer {}", token(&resolver));
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(&bearer).unwrap());
        assert!(resolver.current_user(&headers).is_some());
    }

    #[test]
    fn missing_or_invalid_token_is_none() {
        let resolver = resolver();
        assert!(resolver.current_user(&HeaderMap::new()).is_none());

        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("auth-token=garbage"));
        assert!(resolver.current_user(&headers).is_none());

        let other = SessionResolver::new("other-secret", "auth-token", 1, false);
        let mut headers = HeaderMap::new();
        let cookie = format!("auth-token={}", token(&other));
        headers.insert(header::COOKIE, HeaderValue::from_str(&cookie).unwrap());
        assert!(resolver.current_user(&headers).is_none());
    }

    #[test]
    fn cookie_attributes() {
        let cookie = SessionResolver::new("s", "auth-token", 168, true).session_cookie("abc");
        assert!(cookie.starts_with("auth-token=abc;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Max-Age=604800"));
        assert!(cookie.ends_with("; Secure"));
        assert!(resolver().clear_cookie().contains("Max-Age=0"));
    }
}
