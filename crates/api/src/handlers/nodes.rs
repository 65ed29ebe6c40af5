//! Node lifecycle handlers: registration, config delivery, config ack and
//! capability intake.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use cynode_core::error::CoreError;
use cynode_core::hashing::{constant_time_eq, sha256_hex};
use cynode_core::node_protocol::{
    BootstrapAuth, BootstrapEndpoints, BootstrapOrchestrator, BootstrapPayload, CapabilityReport,
    ConfigAck, ConfigEndpoints, ConfigOrchestrator, InferenceBackendConfig, ModelCache,
    NodeConfigPayload, SandboxRegistry, WorkerApiConfig,
};
use cynode_core::status::NodeStatus;
use cynode_core::types::DbId;
use cynode_core::PROTOCOL_VERSION;
use cynode_db::models::node::{CreateNode, Node, RecordConfigAck};
use serde::Deserialize;
use serde_json::value::RawValue;

use crate::auth::jwt::{issue_token, TokenKind};
use crate::error::{AppError, AppResult};
use crate::extract::ApiJson;
use crate::middleware::auth::AuthNode;
use crate::state::AppState;

pub const REGISTER_PATH: &str = "/v1/nodes/register";
pub const CONFIG_PATH: &str = "/v1/nodes/config";
pub const CAPABILITY_PATH: &str = "/v1/nodes/capability";

/// Config version assigned to a node the first time it is seen.
const INITIAL_CONFIG_VERSION: &str = "1";

/// Body of `POST /v1/nodes/register`.
///
/// The capability report is kept as raw JSON so its hash is computed over
/// exactly the bytes the node sent.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub psk: String,
    pub capability: Box<RawValue>,
}

/// POST /v1/nodes/register
///
/// 201 with a bootstrap payload for a new node, 200 on re-registration.
pub async fn register(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<RegisterRequest>,
) -> AppResult<(StatusCode, Json<BootstrapPayload>)> {
    if !constant_time_eq(
        input.psk.as_bytes(),
        state.config.node_registration_psk.as_bytes(),
    ) {
        tracing::warn!("Node registration rejected: bad pre-shared key");
        return Err(AppError::Core(CoreError::Unauthorized(
            "Invalid registration credentials".into(),
        )));
    }

    let report = parse_capability(input.capability.get())?;
    let slug = report.node.node_slug.as_str();

    let (node, status) = match state.store.find_node_by_slug(slug).await? {
        Some(node) => {
            if matches!(node.status, NodeStatus::Registered | NodeStatus::Inactive) {
                state.store.set_node_status(node.id, NodeStatus::Active).await?;
            }
            tracing::info!(node_id = %node.id, node_slug = %slug, "Node re-registered");
            (node, StatusCode::OK)
        }
        None => {
            let node = state
                .store
                .create_node(&CreateNode {
                    node_slug: slug.to_string(),
                    status: NodeStatus::Active,
                    config_version: Some(INITIAL_CONFIG_VERSION.to_string()),
                })
                .await?;
            tracing::info!(node_id = %node.id, node_slug = %slug, "Node registered");
            (node, StatusCode::CREATED)
        }
    };

    record_capability(&state, node.id, input.capability.get()).await?;

    let issued = issue_token(TokenKind::Node, node.id, &node.node_slug, &state.config.jwt)
        .map_err(|e| AppError::InternalError(format!("Token generation error: {e}")))?;

    let config = &state.config;
    let payload = BootstrapPayload {
        version: PROTOCOL_VERSION,
        issued_at: Utc::now(),
        orchestrator: BootstrapOrchestrator {
            base_url: config.public_url.clone(),
            endpoints: BootstrapEndpoints {
                worker_registration_url: config.public_endpoint(REGISTER_PATH),
                node_report_url: config.public_endpoint(CAPABILITY_PATH),
                node_config_url: config.public_endpoint(CONFIG_PATH),
            },
        },
        auth: BootstrapAuth {
            node_jwt: issued.token,
            expires_at: issued.expires_at,
        },
    };

    Ok((status, Json(payload)))
}

/// GET /v1/nodes/config
///
/// Assigns the config version lazily and persists the worker-API target and
/// bearer token onto the node when both are known.
pub async fn get_config(
    State(state): State<AppState>,
    auth_node: AuthNode,
) -> AppResult<Json<NodeConfigPayload>> {
    let node = find_node(&state, auth_node.node_id).await?;
    let config = &state.config;

    let config_version = state
        .store
        .ensure_config_version(node.id, INITIAL_CONFIG_VERSION)
        .await?;

    let target_url = non_empty(node.worker_api_target_url.as_deref())
        .map(str::to_string)
        .or_else(|| config.worker_api_target_url.clone());
    let bearer_token = non_empty(node.worker_api_bearer_token.as_deref())
        .map(str::to_string)
        .or_else(|| config.worker_api_bearer_token.clone())
        .unwrap_or_else(generate_worker_token);

    if let Some(url) = target_url.as_deref() {
        let unchanged = node.worker_api_target_url.as_deref() == Some(url)
            && node.worker_api_bearer_token.as_deref() == Some(bearer_token.as_str());
        if !unchanged {
            state.store.set_worker_api(node.id, url, &bearer_token).await?;
            tracing::info!(node_slug = %node.node_slug, target_url = %url, "Stored worker API target");
        }
    }

    state.store.record_node_seen(node.id).await?;

    let payload = NodeConfigPayload {
        version: PROTOCOL_VERSION,
        config_version,
        issued_at: Utc::now(),
        node_slug: node.node_slug,
        orchestrator: ConfigOrchestrator {
            base_url: config.public_url.clone(),
            endpoints: ConfigEndpoints {
                worker_api_target_url: target_url,
                node_report_url: config.public_endpoint(CAPABILITY_PATH),
            },
        },
        sandbox_registry: SandboxRegistry {
            registry_url: config.sandbox_registry_url.clone(),
        },
        model_cache: ModelCache {
            cache_url: config.model_cache_url.clone(),
        },
        worker_api: Some(WorkerApiConfig {
            orchestrator_bearer_token: bearer_token,
            orchestrator_bearer_token_expires_at: None,
        }),
        inference_backend: config
            .inference_backend_image
            .as_ref()
            .map(|image| InferenceBackendConfig {
                image: image.clone(),
                model: Some(config.inference_model.clone()),
            }),
        policy: None,
        constraints: None,
    };

    Ok(Json(payload))
}

/// POST /v1/nodes/config
pub async fn ack_config(
    State(state): State<AppState>,
    auth_node: AuthNode,
    ApiJson(ack): ApiJson<ConfigAck>,
) -> AppResult<StatusCode> {
    ack.validate_for(&auth_node.node_slug)?;

    let error = ack
        .error
        .as_ref()
        .map(|e| serde_json::to_string(e).unwrap_or_else(|_| e.message.clone()));

    state
        .store
        .record_config_ack(
            auth_node.node_id,
            &RecordConfigAck {
                config_version: ack.config_version.clone(),
                status: ack.status,
                ack_at: ack.ack_at,
                error,
            },
        )
        .await?;

    tracing::info!(
        node_slug = %auth_node.node_slug,
        config_version = %ack.config_version,
        status = %ack.status,
        "Config acknowledged"
    );
    Ok(StatusCode::NO_CONTENT)
}

/// POST /v1/nodes/capability
pub async fn report_capability(
    State(state): State<AppState>,
    auth_node: AuthNode,
    ApiJson(raw): ApiJson<Box<RawValue>>,
) -> AppResult<StatusCode> {
    let report = parse_capability(raw.get())?;
    if report.node.node_slug != auth_node.node_slug {
        return Err(AppError::Core(CoreError::Validation(
            "node.node_slug does not match the authenticated node".into(),
        )));
    }

    record_capability(&state, auth_node.node_id, raw.get()).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_capability(raw: &str) -> AppResult<CapabilityReport> {
    let report: CapabilityReport = serde_json::from_str(raw).map_err(|e| {
        AppError::Core(CoreError::Validation(format!(
            "invalid capability report: {e}"
        )))
    })?;
    report.validate()?;
    Ok(report)
}

/// Append the snapshot, then update the hash and liveness.
///
/// Only the snapshot insert can fail the request.
async fn record_capability(state: &AppState, node_id: DbId, raw: &str) -> AppResult<()> {
    let value: serde_json::Value = serde_json::from_str(raw)
        .map_err(|e| AppError::Core(CoreError::Validation(e.to_string())))?;
    state.store.insert_capability_snapshot(node_id, &value).await?;

    let hash = sha256_hex(raw.as_bytes());
    if let Err(e) = state.store.set_capability_hash(node_id, &hash).await {
        tracing::error!(error = %e, node_id = %node_id, "Failed to store capability hash");
    }
    if let Err(e) = state.store.record_node_seen(node_id).await {
        tracing::error!(error = %e, node_id = %node_id, "Failed to bump node last_seen_at");
    }
    Ok(())
}

async fn find_node(state: &AppState, id: DbId) -> AppResult<Node> {
    state
        .store
        .find_node_by_id(id)
        .await?
        .ok_or_else(|| AppError::Core(CoreError::NotFound { entity: "Node", id }))
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Random 256-bit token, hex encoded.
fn generate_worker_token() -> String {
    let bytes: [u8; 32] = rand::random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_tokens_are_random_hex() {
        let a = generate_worker_token();
        let b = generate_worker_token();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn capability_with_wrong_version_is_a_validation_error() {
        let err = parse_capability(r#"{"version":2,"node":{"node_slug":"n1"}}"#).unwrap_err();
        assert!(matches!(err, AppError::Core(CoreError::Validation(_))));
    }
}
