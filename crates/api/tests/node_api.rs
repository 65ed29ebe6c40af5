//! Node registration, config delivery, ack and capability intake.

mod common;

use axum::http::StatusCode;
use common::{body_json, capability, config_ack, registration, test_config, TestApp, PSK, PUBLIC_URL};
use cynode_core::hashing::sha256_hex;
use cynode_core::status::NodeStatus;
use cynode_db::NodeStore;
use serde_json::json;

#[tokio::test]
async fn first_registration_creates_node_and_returns_bootstrap() {
    let app = TestApp::new();
    let response = app
        .post("/v1/nodes/register", None, registration(PSK, "n1"))
        .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["version"], 1);
    assert!(!body["auth"]["node_jwt"].as_str().unwrap().is_empty());
    assert!(body["auth"]["expires_at"].is_string());
    assert_eq!(body["orchestrator"]["base_url"], PUBLIC_URL);
    let endpoints = &body["orchestrator"]["endpoints"];
    assert_eq!(
        endpoints["node_report_url"],
        format!("{PUBLIC_URL}/v1/nodes/capability")
    );
    assert_eq!(
        endpoints["node_config_url"],
        format!("{PUBLIC_URL}/v1/nodes/config")
    );
    assert_eq!(
        endpoints["worker_registration_url"],
        format!("{PUBLIC_URL}/v1/nodes/register")
    );

    let node = app.store.find_node_by_slug("n1").await.unwrap().unwrap();
    assert_eq!(node.status, NodeStatus::Active);
    assert_eq!(node.config_version.as_deref(), Some("1"));
    assert_eq!(
        node.capability_hash.as_deref(),
        Some(sha256_hex(capability("n1").to_string().as_bytes()).as_str())
    );
    assert_eq!(app.store.capability_snapshots(node.id).len(), 1);
}

#[tokio::test]
async fn re_registration_reuses_node_and_issues_fresh_credential() {
    let app = TestApp::new();
    let first = app.register_node("n1").await;

    let response = app
        .post("/v1/nodes/register", None, registration(PSK, "n1"))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let second = body_json(response).await;
    assert_ne!(first["auth"]["node_jwt"], second["auth"]["node_jwt"]);

    let node = app.store.find_node_by_slug("n1").await.unwrap().unwrap();
    assert_eq!(app.store.capability_snapshots(node.id).len(), 2);
}

#[tokio::test]
async fn bad_psk_is_401_and_creates_nothing() {
    let app = TestApp::new();
    let response = app
        .post("/v1/nodes/register", None, registration("wrong", "n1"))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(app.store.find_node_by_slug("n1").await.unwrap().is_none());
}

#[tokio::test]
async fn unsupported_capability_version_is_400_and_creates_nothing() {
    let app = TestApp::new();
    let mut cap = capability("n1");
    cap["version"] = json!(2);
    let response = app
        .post("/v1/nodes/register", None, json!({ "psk": PSK, "capability": cap }))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(app.store.find_node_by_slug("n1").await.unwrap().is_none());

    let mut cap = capability("");
    cap["version"] = json!(1);
    let response = app
        .post("/v1/nodes/register", None, json!({ "psk": PSK, "capability": cap }))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn config_fetch_returns_stable_version_and_worker_token() {
    let app = TestApp::new();
    let bootstrap = app.register_node("n1").await;
    let jwt = bootstrap["auth"]["node_jwt"].as_str().unwrap();

    let response = app.get("/v1/nodes/config", Some(jwt)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let first = body_json(response).await;
    assert_eq!(first["version"], 1);
    assert_eq!(first["config_version"], "1");
    assert_eq!(first["node_slug"], "n1");
    assert_eq!(first["sandbox_registry"]["registry_url"], "http://registry.test");
    assert_eq!(first["model_cache"]["cache_url"], "http://cache.test");
    assert!(!first["worker_api"]["orchestrator_bearer_token"]
        .as_str()
        .unwrap()
        .is_empty());
    assert!(first.get("inference_backend").is_none());

    let second = body_json(app.get("/v1/nodes/config", Some(jwt)).await).await;
    assert_eq!(second["config_version"], first["config_version"]);
}

#[tokio::test]
async fn config_fetch_persists_worker_api_target_idempotently() {
    let mut config = test_config();
    config.worker_api_target_url = Some("http://worker.test:12090".into());
    config.inference_backend_image = Some("ollama/ollama".into());
    let app = TestApp::with_config(config);
    let bootstrap = app.register_node("n1").await;
    let jwt = bootstrap["auth"]["node_jwt"].as_str().unwrap();

    let first = body_json(app.get("/v1/nodes/config", Some(jwt)).await).await;
    let second = body_json(app.get("/v1/nodes/config", Some(jwt)).await).await;

    let token = first["worker_api"]["orchestrator_bearer_token"].as_str().unwrap();
    assert_eq!(token.len(), 64);
    assert_eq!(second["worker_api"]["orchestrator_bearer_token"], token);
    assert_eq!(
        first["orchestrator"]["endpoints"]["worker_api_target_url"],
        "http://worker.test:12090"
    );
    assert_eq!(first["inference_backend"]["image"], "ollama/ollama");
    assert_eq!(first["inference_backend"]["model"], "tinyllama");

    let node = app.store.find_node_by_slug("n1").await.unwrap().unwrap();
    assert_eq!(
        node.worker_api_target_url.as_deref(),
        Some("http://worker.test:12090")
    );
    assert_eq!(node.worker_api_bearer_token.as_deref(), Some(token));
}

#[tokio::test]
async fn config_ack_is_recorded() {
    let app = TestApp::new();
    let bootstrap = app.register_node("n1").await;
    let jwt = bootstrap["auth"]["node_jwt"].as_str().unwrap();

    let response = app
        .post("/v1/nodes/config", Some(jwt), config_ack("n1", "1"))
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let node = app.store.find_node_by_slug("n1").await.unwrap().unwrap();
    assert_eq!(node.config_ack_status.as_deref(), Some("applied"));
    assert!(node.config_ack_at.is_some());
    assert!(node.config_ack_error.is_none());
}

#[tokio::test]
async fn failed_ack_stores_the_error() {
    let app = TestApp::new();
    let bootstrap = app.register_node("n1").await;
    let jwt = bootstrap["auth"]["node_jwt"].as_str().unwrap();

    let mut ack = config_ack("n1", "1");
    ack["status"] = json!("failed");
    ack["error"] = json!({ "type": "service_start", "message": "port in use" });
    let response = app.post("/v1/nodes/config", Some(jwt), ack).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let node = app.store.find_node_by_slug("n1").await.unwrap().unwrap();
    assert_eq!(node.config_ack_status.as_deref(), Some("failed"));
    assert!(node.config_ack_error.unwrap().contains("port in use"));
}

#[tokio::test]
async fn config_ack_rejects_foreign_slug_and_bad_version() {
    let app = TestApp::new();
    let bootstrap = app.register_node("n1").await;
    let jwt = bootstrap["auth"]["node_jwt"].as_str().unwrap();

    let response = app
        .post("/v1/nodes/config", Some(jwt), config_ack("n2", "1"))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let mut ack = config_ack("n1", "1");
    ack["version"] = json!(2);
    let response = app.post("/v1/nodes/config", Some(jwt), ack).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let mut ack = config_ack("n1", "1");
    ack["status"] = json!("pending");
    let response = app.post("/v1/nodes/config", Some(jwt), ack).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn identical_capability_reports_hash_identically() {
    let app = TestApp::new();
    let bootstrap = app.register_node("n1").await;
    let jwt = bootstrap["auth"]["node_jwt"].as_str().unwrap();
    let node = app.store.find_node_by_slug("n1").await.unwrap().unwrap();

    let mut report = capability("n1");
    report["compute"]["cpu_cores"] = json!(8);
    for _ in 0..2 {
        let response = app
            .post("/v1/nodes/capability", Some(jwt), report.clone())
            .await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    let node_after = app.store.find_node_by_id(node.id).await.unwrap().unwrap();
    assert_eq!(
        node_after.capability_hash.as_deref(),
        Some(sha256_hex(report.to_string().as_bytes()).as_str())
    );
    assert_ne!(node_after.capability_hash, node.capability_hash);
    assert!(node_after.last_capability_at.is_some());

    let snapshots = app.store.capability_snapshots(node.id);
    assert_eq!(snapshots.len(), 3);
    assert_eq!(snapshots[1].capability_json, snapshots[2].capability_json);
    assert_ne!(snapshots[1].id, snapshots[2].id);
}

#[tokio::test]
async fn capability_report_requires_node_credential_and_matching_slug() {
    let app = TestApp::new();
    let bootstrap = app.register_node("n1").await;
    let jwt = bootstrap["auth"]["node_jwt"].as_str().unwrap();

    let response = app
        .post("/v1/nodes/capability", None, capability("n1"))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .post("/v1/nodes/capability", Some(jwt), capability("n2"))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn capability_report_reactivates_inactive_node() {
    let app = TestApp::new();
    let bootstrap = app.register_node("n1").await;
    let jwt = bootstrap["auth"]["node_jwt"].as_str().unwrap();
    let node = app.store.find_node_by_slug("n1").await.unwrap().unwrap();
    app.store
        .set_node_status(node.id, NodeStatus::Inactive)
        .await
        .unwrap();

    let response = app
        .post("/v1/nodes/capability", Some(jwt), capability("n1"))
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let node = app.store.find_node_by_id(node.id).await.unwrap().unwrap();
    assert_eq!(node.status, NodeStatus::Active);
}

#[tokio::test]
async fn drained_node_stays_drained_on_re_registration() {
    let app = TestApp::new();
    app.register_node("n1").await;
    let node = app.store.find_node_by_slug("n1").await.unwrap().unwrap();
    app.store
        .set_node_status(node.id, NodeStatus::Drained)
        .await
        .unwrap();

    app.register_node("n1").await;

    let node = app.store.find_node_by_id(node.id).await.unwrap().unwrap();
    assert_eq!(node.status, NodeStatus::Drained);
}
