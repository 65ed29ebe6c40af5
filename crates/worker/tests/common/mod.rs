#![allow(dead_code)]

use std::time::Duration;

use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{Method, Request};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use cynode_worker::config::{ExecutorConfig, SandboxMode};
use cynode_worker::executor::SandboxExecutor;
use cynode_worker::server::{self, WorkerState};

pub const TOKEN: &str = "worker-secret-token";

/// Build the worker router over a direct-mode executor.
pub fn build_test_app(max_output_bytes: usize) -> Router {
    let executor = SandboxExecutor::new(ExecutorConfig {
        mode: SandboxMode::Direct,
        default_timeout: Duration::from_secs(30),
        max_output_bytes,
        ..ExecutorConfig::default()
    });
    server::router(WorkerState::new(executor, TOKEN))
}

pub async fn post_job(app: Router, body: serde_json::Value, token: Option<&str>) -> Response {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri("/v1/worker/jobs:run")
        .header(CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
    }
    app.oneshot(builder.body(Body::from(body.to_string())).unwrap())
        .await
        .unwrap()
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

pub async fn body_json(response: Response) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

pub fn job(command: &[&str]) -> serde_json::Value {
    serde_json::json!({
        "version": 1,
        "task_id": "t-1",
        "job_id": "j-1",
        "sandbox": { "command": command },
    })
}
