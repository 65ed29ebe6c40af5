//! Node lifecycle payloads exchanged between the agent and the control plane.
//!
//! Registration -> bootstrap, config fetch -> node config, config ack, and the
//! periodic capability report. All of them carry `version = 1`.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::status::ConfigAckStatus;
use crate::types::Timestamp;

// ---------------------------------------------------------------------------
// Capability report
// ---------------------------------------------------------------------------

/// Self-description a node sends at registration and on every report tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityReport {
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reported_at: Option<Timestamp>,
    pub node: NodeIdentity,
    #[serde(default)]
    pub platform: Platform,
    #[serde(default)]
    pub compute: Compute,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpu: Option<GpuInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sandbox: Option<SandboxSupport>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeIdentity {
    pub node_slug: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Platform {
    #[serde(default)]
    pub os: String,
    #[serde(default)]
    pub arch: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kernel_version: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Compute {
    #[serde(default)]
    pub cpu_cores: u32,
    #[serde(default)]
    pub ram_mb: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpuInfo {
    pub devices: Vec<GpuDevice>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpuDevice {
    pub index: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub vram_total_mb: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SandboxSupport {
    pub supported: bool,
    /// `container` or `direct`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime: Option<String>,
}

impl CapabilityReport {
    /// Check the version and that the node slug is present.
    pub fn validate(&self) -> Result<(), CoreError> {
        CoreError::check_version(self.version)?;
        if self.node.node_slug.trim().is_empty() {
            return Err(CoreError::Validation("node.node_slug is required".into()));
        }
        Ok(())
    }
}

/// Body of `POST /v1/nodes/register`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRegistrationRequest {
    pub psk: String,
    pub capability: CapabilityReport,
}

// ---------------------------------------------------------------------------
// Bootstrap
// ---------------------------------------------------------------------------

/// Registration response: where to go next and the node credential to use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BootstrapPayload {
    pub version: u32,
    pub issued_at: Timestamp,
    pub orchestrator: BootstrapOrchestrator,
    pub auth: BootstrapAuth,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BootstrapOrchestrator {
    pub base_url: String,
    pub endpoints: BootstrapEndpoints,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BootstrapEndpoints {
    pub worker_registration_url: String,
    pub node_report_url: String,
    pub node_config_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BootstrapAuth {
    pub node_jwt: String,
    pub expires_at: Timestamp,
}

impl BootstrapPayload {
    /// Check everything a node needs before it can continue startup.
    pub fn validate(&self) -> Result<(), CoreError> {
        CoreError::check_version(self.version)?;
        if self.auth.node_jwt.is_empty() {
            return Err(CoreError::Validation("bootstrap is missing auth.node_jwt".into()));
        }
        if self.orchestrator.endpoints.node_report_url.is_empty() {
            return Err(CoreError::Validation(
                "bootstrap is missing endpoints.node_report_url".into(),
            ));
        }
        if self.orchestrator.endpoints.node_config_url.is_empty() {
            return Err(CoreError::Validation(
                "bootstrap is missing endpoints.node_config_url".into(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Node configuration
// ---------------------------------------------------------------------------

/// Response of `GET /v1/nodes/config`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeConfigPayload {
    pub version: u32,
    pub config_version: String,
    pub issued_at: Timestamp,
    pub node_slug: String,
    pub orchestrator: ConfigOrchestrator,
    pub sandbox_registry: SandboxRegistry,
    pub model_cache: ModelCache,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_api: Option<WorkerApiConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inference_backend: Option<InferenceBackendConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraints: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigOrchestrator {
    pub base_url: String,
    pub endpoints: ConfigEndpoints,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigEndpoints {
    /// URL the control plane calls to dispatch jobs to this node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_api_target_url: Option<String>,
    pub node_report_url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SandboxRegistry {
    pub registry_url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelCache {
    pub cache_url: String,
}

/// Bearer token the control plane will present to the node's worker API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerApiConfig {
    pub orchestrator_bearer_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orchestrator_bearer_token_expires_at: Option<Timestamp>,
}

/// Local inference container the node should run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceBackendConfig {
    pub image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl NodeConfigPayload {
    pub fn validate(&self) -> Result<(), CoreError> {
        CoreError::check_version(self.version)?;
        if self.config_version.is_empty() {
            return Err(CoreError::Validation("config_version is required".into()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Config acknowledgement
// ---------------------------------------------------------------------------

/// Body of `POST /v1/nodes/config`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigAck {
    pub version: u32,
    pub node_slug: String,
    pub config_version: String,
    pub ack_at: Timestamp,
    pub status: ConfigAckStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ConfigAckError>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigAckError {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ConfigAck {
    /// Validate an ack against the slug of the node that sent it.
    pub fn validate_for(&self, authenticated_slug: &str) -> Result<(), CoreError> {
        CoreError::check_version(self.version)?;
        if self.node_slug != authenticated_slug {
            return Err(CoreError::Validation(
                "node_slug does not match the authenticated node".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn report(version: u32, slug: &str) -> CapabilityReport {
        CapabilityReport {
            version,
            reported_at: None,
            node: NodeIdentity {
                node_slug: slug.to_string(),
                name: None,
            },
            platform: Platform::default(),
            compute: Compute::default(),
            gpu: None,
            sandbox: None,
        }
    }

    #[test]
    fn capability_report_requires_version_one_and_slug() {
        assert!(report(1, "n1").validate().is_ok());
        assert_matches!(report(2, "n1").validate(), Err(CoreError::Validation(_)));
        assert_matches!(report(1, "  ").validate(), Err(CoreError::Validation(_)));
    }

    #[test]
    fn minimal_capability_report_decodes_with_defaults() {
        let json = serde_json::json!({
            "version": 1,
            "node": { "node_slug": "n1" },
        });
        let parsed: CapabilityReport = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.compute.cpu_cores, 0);
        assert!(parsed.platform.os.is_empty());
    }

    #[test]
    fn config_ack_rejects_foreign_slug() {
        let ack = ConfigAck {
            version: 1,
            node_slug: "n2".into(),
            config_version: "1".into(),
            ack_at: chrono::Utc::now(),
            status: ConfigAckStatus::Applied,
            error: None,
        };
        assert!(ack.validate_for("n2").is_ok());
        assert_matches!(ack.validate_for("n1"), Err(CoreError::Validation(_)));
    }

    #[test]
    fn config_ack_error_uses_type_key() {
        let err = ConfigAckError {
            kind: "service_start".into(),
            message: "boom".into(),
            details: None,
        };
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["type"], "service_start");
    }
}
