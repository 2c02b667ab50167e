// handlers/system.rs - Service info and health probes

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};
use tracing::warn;

use crate::app::AppState;

/// GET / - Service description
pub async fn root() -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "success": true,
        "data": {
            "name": "School API (Rust)",
            "version": version,
            "description": "Multi-tenant school management API built with Rust (Axum)",
            "endpoints": {
                "health": "/health (public)",
                "auth": "/api/auth/login, /api/auth/logout (public), /api/auth/me (protected)",
                "site": "/api/site/pages/:slug (public)",
                "crud": "/api/crud/:collection (protected)",
                "classes": "/api/classes, /api/classes/schedule (protected)",
                "courses": "/api/courses[/:id] (protected)",
                "exams": "/api/exams[/:id] (protected)",
                "formbuilder": "/api/formbuilder[/:id], /api/formbuilder/submissions (protected)",
                "messages": "/api/messages/inbox|send|reply, /api/messages/:id[/read] (protected)",
                "pages": "/api/admin/pages[/:id] (protected)",
                "feedback": "/api/feedback (protected)",
                "dropdown": "/api/dropdown-options/:collection (protected)",
            },
            "tenancy": "x-domain header selects the tenant database",
        }
    }))
}

/// GET /health - Ping the default tenant's store
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();
    let domain = &state.config.server.default_domain;

    let probe = match state.router.resolve(domain).await {
        Ok(conn) => conn
            .handle
            .ping()
            .await
            .map(|_| conn.handle.backend())
            .map_err(|e| e.to_string()),
        Err(e) => Err(e.to_string()),
    };
    let tenants = state.router.cached().await.len();

    match probe {
        Ok(backend) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok",
                    "backend": backend,
                    "tenants": tenants,
                }
            })),
        ),
        Err(e) => {
            warn!("Health check failed for {}: {}", domain, e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "error": "database unavailable",
                    "code": "SERVICE_UNAVAILABLE",
                    "data": {
                        "status": "degraded",
                        "timestamp": now,
                        "tenants": tenants,
                    }
                })),
            )
        }
    }
}
