//! Problem-document rendering and middleware behaviour.

mod common;

use axum::body::Body;
use axum::http::header::CONTENT_TYPE;
use axum::http::{Method, Request, StatusCode};
use common::{body_bytes, body_json, test_config, TestApp};

#[tokio::test]
async fn healthz_returns_ok() {
    let app = TestApp::new();
    let response = app.get("/healthz", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, b"ok");
}

#[tokio::test]
async fn responses_carry_a_request_id() {
    let app = TestApp::new();
    let response = app.get("/healthz", None).await;
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn malformed_json_is_a_validation_problem() {
    let app = TestApp::new();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/v1/auth/login")
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();

    let response = app.send(request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        response.headers()["content-type"],
        "application/problem+json"
    );
    let body = body_json(response).await;
    assert_eq!(body["type"], "urn:cynodeai:error:validation");
    assert_eq!(body["status"], 400);
    assert_eq!(body["title"], "Validation Error");
}

#[tokio::test]
async fn oversized_body_is_413() {
    let mut config = test_config();
    config.max_request_body_bytes = 64;
    let app = TestApp::with_config(config);

    let big = serde_json::json!({ "handle": "a".repeat(200), "password": "pw" });
    let response = app.post("/v1/auth/login", None, big).await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let body = body_json(response).await;
    assert_eq!(body["type"], "urn:cynodeai:error:payload_too_large");
}

#[tokio::test]
async fn unknown_route_is_404() {
    let app = TestApp::new();
    let response = app.get("/v1/nope", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
