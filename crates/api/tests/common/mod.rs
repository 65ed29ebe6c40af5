#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{Method, Request};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use cynode_api::auth::jwt::JwtConfig;
use cynode_api::auth::password::{hash_password, HASH_ALGORITHM};
use cynode_api::config::ServerConfig;
use cynode_api::router::build_app_router;
use cynode_api::state::AppState;
use cynode_core::types::DbId;
use cynode_db::models::user::CreateUser;
use cynode_db::{MemoryStore, UserStore};

pub const PSK: &str = "psk-1";
pub const PUBLIC_URL: &str = "http://cp.test:12080";

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        max_request_body_bytes: 1024 * 1024,
        jwt: JwtConfig {
            secret: "integration-test-secret".to_string(),
            access_token_expiry_mins: 15,
            refresh_token_expiry_days: 7,
            node_token_expiry_hours: 24,
        },
        node_registration_psk: PSK.to_string(),
        public_url: PUBLIC_URL.to_string(),
        worker_api_target_url: None,
        worker_api_bearer_token: None,
        sandbox_registry_url: "http://registry.test".to_string(),
        model_cache_url: "http://cache.test".to_string(),
        inference_backend_image: None,
        inference_model: "tinyllama".to_string(),
        prompt_mode_image: "python:3.12-alpine".to_string(),
        login_rate_limit_per_minute: 1000,
        dispatch_tick: Duration::from_millis(50),
        dispatch_http_timeout: Duration::from_secs(10),
        node_stale_after: Duration::from_secs(300),
        bootstrap_admin_handle: "admin".to_string(),
        bootstrap_admin_password: None,
    }
}

/// The real router over an in-memory store the test can inspect.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: ServerConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let state = AppState::new(store.clone(), config);
        Self {
            router: build_app_router(state),
            store,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> Response {
        self.send(request(Method::GET, uri, token, None)).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> Response {
        self.send(request(Method::POST, uri, token, Some(body))).await
    }

    /// Seed an active user with a password credential.
    pub async fn seed_user(&self, handle: &str, password: &str) -> DbId {
        let user = self
            .store
            .create_user(&CreateUser {
                handle: handle.to_string(),
                email: Some(format!("{handle}@example.com")),
            })
            .await
            .unwrap();
        let hash = hash_password(password).unwrap();
        self.store
            .set_password_credential(user.id, &hash, HASH_ALGORITHM)
            .await
            .unwrap();
        user.id
    }

    /// Log in and return `(access_token, refresh_token)`.
    pub async fn login(&self, handle: &str, password: &str) -> (String, String) {
        let response = self
            .post(
                "/v1/auth/login",
                None,
                json!({ "handle": handle, "password": password }),
            )
            .await;
        assert_eq!(response.status(), 200, "login should succeed");
        let body = body_json(response).await;
        (
            body["access_token"].as_str().unwrap().to_string(),
            body["refresh_token"].as_str().unwrap().to_string(),
        )
    }

    /// Register a node and return the bootstrap response body.
    pub async fn register_node(&self, slug: &str) -> Value {
        let response = self
            .post("/v1/nodes/register", None, registration(PSK, slug))
            .await;
        assert!(response.status().is_success(), "registration should succeed");
        body_json(response).await
    }
}

pub fn request(method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
    }
    match body {
        Some(body) => builder
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub fn capability(slug: &str) -> Value {
    json!({
        "version": 1,
        "node": { "node_slug": slug },
        "platform": { "os": "linux", "arch": "amd64" },
        "compute": { "cpu_cores": 2, "ram_mb": 4096 },
    })
}

pub fn registration(psk: &str, slug: &str) -> Value {
    json!({ "psk": psk, "capability": capability(slug) })
}

pub fn config_ack(slug: &str, config_version: &str) -> Value {
    json!({
        "version": 1,
        "node_slug": slug,
        "config_version": config_version,
        "ack_at": "2026-01-01T00:00:00Z",
        "status": "applied",
    })
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}
