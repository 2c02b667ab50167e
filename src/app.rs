use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderName, HeaderValue, Method},
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

use crate::config::AppConfig;
use crate::database::ConnectionRouter;
use crate::handlers::{protected, public, system};
use crate::middleware::{SessionResolver, DOMAIN_HEADER};

/// Shared handler state; cheap to clone
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub router: Arc<ConnectionRouter>,
    pub sessions: SessionResolver,
}

impl AppState {
    pub fn new(config: AppConfig, router: Arc<ConnectionRouter>) -> Self {
        let sessions = SessionResolver::from_config(&config.security);
        Self {
            config: Arc::new(config),
            router,
            sessions,
        }
    }
}

pub fn app(state: AppState) -> Router {
    let body_limit = state.config.api.max_request_size_bytes;
    let cors = cors_layer(&state.config.security.cors_origins);

    Router::new()
        // System
        .route("/", get(system::root))
        .route("/health", get(system::health))
        // Public
        .merge(public_routes())
        // Protected (session required)
        .merge(auth_routes())
        .merge(crud_routes())
        .merge(school_routes())
        .merge(formbuilder_routes())
        .merge(message_routes())
        .merge(page_routes())
        .merge(feedback_routes())
        // Global middleware
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter(|o| !o.is_empty())
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin {}", o);
                None
            }
        })
        .collect();

    if origins.is_empty() {
        return CorsLayer::permissive();
    }

    // Credentialed requests need explicit origins, methods and headers
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static(DOMAIN_HEADER),
        ])
}

fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/login", post(public::auth::login))
        .route("/api/auth/logout", post(public::auth::logout))
        .route("/api/site/pages/:slug", get(public::site::page_by_slug))
}

fn auth_routes() -> Router<AppState> {
    Router::new().route("/api/auth/me", get(protected::auth::me))
}

fn crud_routes() -> Router<AppState> {
    use protected::crud;

    Router::new().route(
        "/api/crud/:collection",
        get(crud::list)
            .post(crud::create)
            .put(crud::update)
            .delete(crud::delete),
    )
}

fn school_routes() -> Router<AppState> {
    use protected::{classes, courses, dropdown, exams};

    Router::new()
        .route("/api/classes", get(classes::list))
        .route("/api/classes/schedule", put(classes::update_schedule))
        .route("/api/courses", get(courses::list).post(courses::create))
        .route("/api/courses/:id", axum::routing::delete(courses::delete))
        .route("/api/exams", get(exams::list).post(exams::create))
        .route("/api/exams/:id", get(exams::get).delete(exams::delete))
        .route("/api/dropdown-options/:collection", get(dropdown::options))
}

fn formbuilder_routes() -> Router<AppState> {
    use protected::formbuilder;

    Router::new()
        .route("/api/formbuilder", get(formbuilder::list).post(formbuilder::create))
        .route(
            "/api/formbuilder/submissions",
            get(formbuilder::list_submissions).post(formbuilder::submit),
        )
        .route(
            "/api/formbuilder/:id",
            get(formbuilder::get)
                .put(formbuilder::update)
                .delete(formbuilder::delete),
        )
}

fn message_routes() -> Router<AppState> {
    use protected::messages;

    Router::new()
        .route("/api/messages/inbox", get(messages::inbox))
        .route("/api/messages/send", post(messages::send))
        .route("/api/messages/reply", post(messages::reply))
        .route("/api/messages/:id/read", put(messages::mark_read))
        .route("/api/messages/:id", axum::routing::delete(messages::delete))
}

fn page_routes() -> Router<AppState> {
    use protected::pages;

    Router::new()
        .route("/api/admin/pages", get(pages::list).post(pages::create))
        .route(
            "/api/admin/pages/:id",
            get(pages::get).put(pages::update).delete(pages::delete),
        )
}

fn feedback_routes() -> Router<AppState> {
    use protected::feedback;

    Router::new().route("/api/feedback", get(feedback::list).post(feedback::submit))
}
