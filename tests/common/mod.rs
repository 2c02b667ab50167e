#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use school_api_rust::app::{app, AppState};
use school_api_rust::auth::{generate_jwt, hash_password, Claims};
use school_api_rust::config::{AppConfig, StoreBackend, TenantDirectory, TenantEntry};
use school_api_rust::database::{
    ConnectionRouter, DataMap, Document, DocumentStore, MemoryConnector, MemoryDocumentStore,
};

pub const ALBORZ: &str = "alborz.test";
pub const SINA: &str = "sina.test";
pub const MASTER: &str = "master.test";

pub const ALBORZ_SCHOOL: &str = "2001";
pub const SINA_SCHOOL: &str = "3001";

/// In-process app over the memory backend with two pinned tenants
pub struct TestApp {
    pub config: AppConfig,
    pub router: Arc<ConnectionRouter>,
    pub connector: Arc<MemoryConnector>,
    app: Router,
}

fn entry(school_code: &str, database: &str) -> TenantEntry {
    TenantEntry {
        school_code: Some(school_code.to_string()),
        database: Some(database.to_string()),
        ..Default::default()
    }
}

impl TestApp {
    pub fn new() -> Self {
        let mut config = AppConfig::development();
        config.database.backend = StoreBackend::Memory;
        config.database.url = None;
        config.database.master_domain = MASTER.to_string();
        config.server.default_domain = ALBORZ.to_string();
        config.security.jwt_secret = "integration-secret".to_string();

        let mut entries = HashMap::new();
        entries.insert(ALBORZ.to_string(), entry(ALBORZ_SCHOOL, "alborz"));
        entries.insert(SINA.to_string(), entry(SINA_SCHOOL, "sina"));
        entries.insert(
            MASTER.to_string(),
            TenantEntry {
                database: Some("master".to_string()),
                ..Default::default()
            },
        );
        let directory = TenantDirectory::with_entries(entries, None);

        let connector = Arc::new(MemoryConnector::new());
        let router = Arc::new(ConnectionRouter::new(
            directory,
            connector.clone(),
            MASTER,
        ));
        let app = app(AppState::new(config.clone(), router.clone()));

        Self {
            config,
            router,
            connector,
            app,
        }
    }

    /// Backing store of a tenant; does not go through the router
    pub fn store(&self, domain: &str) -> Arc<MemoryDocumentStore> {
        let database = match domain {
            ALBORZ => "alborz",
            SINA => "sina",
            MASTER => "master",
            other => return self.connector.store(&TenantDirectory::derive_database_name(other)),
        };
        self.connector.store(database)
    }

    pub fn token(&self, domain: &str, school_code: &str, user_type: &str, username: &str) -> String {
        let claims = Claims::new("u-1", domain, school_code, user_type, username, 1);
        generate_jwt(&claims, &self.config.security.jwt_secret).expect("token")
    }

    pub fn school_token(&self) -> String {
        self.token(ALBORZ, ALBORZ_SCHOOL, "school", "admin")
    }

    pub fn teacher_token(&self, username: &str) -> String {
        self.token(ALBORZ, ALBORZ_SCHOOL, "teacher", username)
    }

    pub fn student_token(&self, username: &str) -> String {
        self.token(ALBORZ, ALBORZ_SCHOOL, "student", username)
    }

    pub async fn seed(&self, domain: &str, collection: &str, value: Value) -> Document {
        let data: DataMap = value.as_object().cloned().expect("object");
        self.store(domain)
            .insert(collection, data)
            .await
            .expect("seed insert")
    }

    pub async fn seed_account(&self, collection: &str, mut value: Value, password: &str) -> Document {
        value["password"] = json!(format!("sha256${}", hash_password(password)));
        value["isActive"] = json!(true);
        self.seed(ALBORZ, collection, value).await
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        domain: Option<&str>,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Result<TestResponse> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(domain) = domain {
            builder = builder.header("x-domain", domain);
        }
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&body)?))?,
            None => builder.body(Body::empty())?,
        };

        let response = self.app.clone().oneshot(request).await?;
        let status = response.status();
        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).context("response body is not JSON")?
        };

        Ok(TestResponse {
            status,
            body,
            set_cookie,
        })
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> Result<TestResponse> {
        self.send(Method::GET, uri, Some(ALBORZ), token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> Result<TestResponse> {
        self.send(Method::POST, uri, Some(ALBORZ), token, Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: Option<&str>, body: Value) -> Result<TestResponse> {
        self.send(Method::PUT, uri, Some(ALBORZ), token, Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>, body: Option<Value>) -> Result<TestResponse> {
        self.send(Method::DELETE, uri, Some(ALBORZ), token, body).await
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
    pub set_cookie: Option<String>,
}

impl TestResponse {
    pub fn data(&self) -> &Value {
        &self.body["data"]
    }

    pub fn error(&self) -> &str {
        self.body["error"].as_str().unwrap_or_default()
    }
}
