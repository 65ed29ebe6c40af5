//! HTTP-level tests for the worker API.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{body_bytes, body_json, build_test_app, job, post_job, TOKEN};
use tower::ServiceExt;

#[tokio::test]
async fn healthz_returns_ok() {
    let app = build_test_app(1024);
    let response = app
        .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, b"ok");
}

#[tokio::test]
async fn missing_bearer_is_rejected_without_leaking_token() {
    let app = build_test_app(1024);
    let response = post_job(app, job(&["echo", "hi"]), None).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.headers()["content-type"],
        "application/problem+json"
    );
    let body = body_bytes(response).await;
    let text = String::from_utf8_lossy(&body);
    assert!(!text.contains(TOKEN));
    assert!(text.contains("urn:cynodeai:error:authentication"));
}

#[tokio::test]
async fn wrong_bearer_is_rejected() {
    let app = build_test_app(1024);
    let response = post_job(app, job(&["echo", "hi"]), Some("not-the-token")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn echo_job_completes() {
    let app = build_test_app(1024);
    let response = post_job(app, job(&["sh", "-c", "echo hello"]), Some(TOKEN)).await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["version"], 1);
    assert_eq!(json["task_id"], "t-1");
    assert_eq!(json["job_id"], "j-1");
    assert_eq!(json["status"], "completed");
    assert_eq!(json["exit_code"], 0);
    assert_eq!(json["stdout"], "hello\n");
    assert_eq!(json["truncated"]["stdout"], false);
    assert_eq!(json["truncated"]["stderr"], false);
}

#[tokio::test]
async fn wall_clock_timeout_reports_timeout() {
    let app = build_test_app(1024);
    let mut body = job(&["sleep", "10"]);
    body["sandbox"]["timeout_seconds"] = 1.into();

    let started = std::time::Instant::now();
    let response = post_job(app, body, Some(TOKEN)).await;
    let elapsed = started.elapsed();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "timeout");
    assert_eq!(json["exit_code"], -1);
    assert!(elapsed < std::time::Duration::from_secs(5));

    let started_at: chrono::DateTime<chrono::Utc> =
        json["started_at"].as_str().unwrap().parse().unwrap();
    let ended_at: chrono::DateTime<chrono::Utc> =
        json["ended_at"].as_str().unwrap().parse().unwrap();
    let ran = ended_at - started_at;
    assert!(ran >= chrono::Duration::milliseconds(900));
    assert!(ran < chrono::Duration::seconds(5));
}

#[tokio::test]
async fn oversized_stdout_is_truncated_to_exact_cap() {
    const CAP: usize = 1024 * 1024;
    let app = build_test_app(CAP);
    let body = job(&["sh", "-c", "head -c 1500000 /dev/zero | tr '\\0' 'a'"]);

    let response = post_job(app, body, Some(TOKEN)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;

    assert_eq!(json["status"], "completed");
    assert_eq!(json["truncated"]["stdout"], true);
    assert_eq!(json["truncated"]["stderr"], false);
    assert_eq!(json["stdout"].as_str().unwrap().len(), CAP);
}

#[tokio::test]
async fn unsupported_version_is_a_validation_problem() {
    let app = build_test_app(1024);
    let mut body = job(&["true"]);
    body["version"] = 2.into();

    let response = post_job(app, body, Some(TOKEN)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["type"], "urn:cynodeai:error:validation");
}

#[tokio::test]
async fn empty_command_is_a_validation_problem() {
    let app = build_test_app(1024);
    let response = post_job(app, job(&[]), Some(TOKEN)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn malformed_json_is_a_validation_problem() {
    let app = build_test_app(1024);
    let request = Request::post("/v1/worker/jobs:run")
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {TOKEN}"))
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["type"], "urn:cynodeai:error:validation");
}
