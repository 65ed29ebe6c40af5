#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use cynode_agent::collector::CapabilityCollector;
use cynode_agent::config::AgentConfig;
use cynode_agent::manager::NodeManager;
use cynode_core::node_protocol::{CapabilityReport, ConfigAck, NodeRegistrationRequest};
use cynode_worker::config::{ExecutorConfig, SandboxMode};

pub const PSK: &str = "agent-psk";
pub const NODE_JWT: &str = "node-jwt-1";
pub const WORKER_TOKEN: &str = "worker-token-1";
pub const CONFIG_VERSION: &str = "7";

/// How the mock control plane answers.
#[derive(Debug, Clone)]
pub struct Behaviour {
    pub bootstrap_version: u32,
    pub worker_token: Option<String>,
    /// Number of capability reports to reject with 401 before accepting.
    pub reject_reports: usize,
}

impl Default for Behaviour {
    fn default() -> Self {
        Self {
            bootstrap_version: 1,
            worker_token: Some(WORKER_TOKEN.into()),
            reject_reports: 0,
        }
    }
}

/// Requests the mock control plane has seen.
#[derive(Debug, Default)]
pub struct Recorded {
    pub registrations: Vec<NodeRegistrationRequest>,
    pub config_fetches: usize,
    pub acks: Vec<ConfigAck>,
    pub reports: Vec<CapabilityReport>,
    pub rejected_reports: usize,
}

#[derive(Clone)]
struct MockState {
    base_url: String,
    behaviour: Behaviour,
    recorded: Arc<Mutex<Recorded>>,
}

pub struct MockOrchestrator {
    pub base_url: String,
    pub recorded: Arc<Mutex<Recorded>>,
}

impl MockOrchestrator {
    pub async fn start(behaviour: Behaviour) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let recorded = Arc::new(Mutex::new(Recorded::default()));
        let state = MockState {
            base_url: base_url.clone(),
            behaviour,
            recorded: recorded.clone(),
        };
        let app = Router::new()
            .route("/v1/nodes/register", post(register))
            .route("/v1/nodes/config", post(ack).get(config))
            .route("/v1/nodes/capability", post(capability))
            .with_state(state);
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self { base_url, recorded }
    }

    pub fn acks(&self) -> Vec<ConfigAck> {
        self.recorded.lock().unwrap().acks.clone()
    }

    pub fn report_count(&self) -> usize {
        self.recorded.lock().unwrap().reports.len()
    }

    pub fn registration_count(&self) -> usize {
        self.recorded.lock().unwrap().registrations.len()
    }

    /// Poll until `check` holds, failing after five seconds.
    pub async fn wait_for(&self, check: impl Fn(&Recorded) -> bool) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            if check(&self.recorded.lock().unwrap()) {
                return;
            }
            assert!(tokio::time::Instant::now() < deadline, "timed out waiting");
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {NODE_JWT}"))
}

async fn register(State(state): State<MockState>, Json(body): Json<NodeRegistrationRequest>) -> Response {
    if body.psk != PSK {
        return (StatusCode::UNAUTHORIZED, "bad psk").into_response();
    }
    let first = {
        let mut recorded = state.recorded.lock().unwrap();
        recorded.registrations.push(body);
        recorded.registrations.len() == 1
    };
    let status = if first { StatusCode::CREATED } else { StatusCode::OK };
    let bootstrap = json!({
        "version": state.behaviour.bootstrap_version,
        "issued_at": chrono::Utc::now(),
        "orchestrator": {
            "base_url": state.base_url,
            "endpoints": {
                "worker_registration_url": format!("{}/v1/nodes/register", state.base_url),
                "node_report_url": format!("{}/v1/nodes/capability", state.base_url),
                "node_config_url": format!("{}/v1/nodes/config", state.base_url),
            }
        },
        "auth": {
            "node_jwt": NODE_JWT,
            "expires_at": chrono::Utc::now() + chrono::Duration::hours(24),
        }
    });
    (status, Json(bootstrap)).into_response()
}

async fn config(State(state): State<MockState>, headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    state.recorded.lock().unwrap().config_fetches += 1;
    let mut payload = json!({
        "version": 1,
        "config_version": CONFIG_VERSION,
        "issued_at": chrono::Utc::now(),
        "node_slug": "node-a",
        "orchestrator": {
            "base_url": state.base_url,
            "endpoints": {
                "node_report_url": format!("{}/v1/nodes/capability", state.base_url),
            }
        },
        "sandbox_registry": { "registry_url": "" },
        "model_cache": { "cache_url": "" },
    });
    if let Some(token) = &state.behaviour.worker_token {
        payload["worker_api"] = json!({ "orchestrator_bearer_token": token });
    }
    Json(payload).into_response()
}

async fn ack(State(state): State<MockState>, headers: HeaderMap, Json(body): Json<ConfigAck>) -> StatusCode {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED;
    }
    state.recorded.lock().unwrap().acks.push(body);
    StatusCode::NO_CONTENT
}

async fn capability(
    State(state): State<MockState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> StatusCode {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED;
    }
    let mut recorded = state.recorded.lock().unwrap();
    if recorded.rejected_reports < state.behaviour.reject_reports {
        recorded.rejected_reports += 1;
        return StatusCode::UNAUTHORIZED;
    }
    match serde_json::from_value(body) {
        Ok(report) => {
            recorded.reports.push(report);
            StatusCode::NO_CONTENT
        }
        Err(_) => StatusCode::BAD_REQUEST,
    }
}

/// Agent configuration pointing at `orchestrator_url`, with a direct-mode
/// executor and an ephemeral worker port.
pub fn agent_config(orchestrator_url: &str) -> AgentConfig {
    AgentConfig {
        orchestrator_url: orchestrator_url.to_string(),
        node_slug: "node-a".into(),
        node_name: "Node A".into(),
        registration_psk: PSK.into(),
        report_interval: Duration::from_millis(50),
        http_timeout: Duration::from_secs(5),
        worker_listen_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        executor: ExecutorConfig {
            mode: SandboxMode::Direct,
            ..ExecutorConfig::default()
        },
        inference_proxy_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        inference_backend_url: "http://127.0.0.1:11435".into(),
    }
}

pub fn manager(config: AgentConfig) -> NodeManager {
    let collector =
        CapabilityCollector::without_gpu(&config.node_slug, &config.node_name, config.executor.clone());
    NodeManager::new(config, collector).unwrap()
}
