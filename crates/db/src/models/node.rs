//! Node entity, capability snapshots, and config-ack DTOs.

use cynode_core::status::{ConfigAckStatus, NodeStatus};
use cynode_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A node row from the `nodes` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Node {
    pub id: DbId,
    pub node_slug: String,
    #[sqlx(try_from = "String")]
    pub status: NodeStatus,
    pub capability_hash: Option<String>,
    pub config_version: Option<String>,
    pub last_seen_at: Option<Timestamp>,
    pub last_capability_at: Option<Timestamp>,
    /// `applied`, `failed`, or `NULL` before the first ack.
    pub config_ack_status: Option<String>,
    pub config_ack_at: Option<Timestamp>,
    pub config_ack_error: Option<String>,
    pub worker_api_target_url: Option<String>,
    #[serde(skip_serializing)]
    pub worker_api_bearer_token: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Node {
    pub fn ack_status(&self) -> Option<ConfigAckStatus> {
        self.config_ack_status.as_deref().and_then(|s| s.parse().ok())
    }

    /// Whether the dispatcher may send jobs to this node.
    ///
    /// Requires `active` status, an `applied` config ack, and non-empty
    /// worker-API URL and bearer token.
    pub fn is_dispatchable(&self) -> bool {
        self.status == NodeStatus::Active
            && self.ack_status() == Some(ConfigAckStatus::Applied)
            && self
                .worker_api_target_url
                .as_deref()
                .is_some_and(|u| !u.is_empty())
            && self
                .worker_api_bearer_token
                .as_deref()
                .is_some_and(|t| !t.is_empty())
    }
}

/// DTO for inserting a node on first registration.
#[derive(Debug, Clone)]
pub struct CreateNode {
    pub node_slug: String,
    pub status: NodeStatus,
    pub config_version: Option<String>,
}

/// A row from the `node_capabilities` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct NodeCapabilitySnapshot {
    pub id: DbId,
    pub node_id: DbId,
    pub captured_at: Timestamp,
    pub capability_json: serde_json::Value,
}

/// DTO for recording a config acknowledgement onto the node row.
#[derive(Debug, Clone)]
pub struct RecordConfigAck {
    pub config_version: String,
    pub status: ConfigAckStatus,
    pub ack_at: Timestamp,
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn node() -> Node {
        Node {
            id: DbId::new_v4(),
            node_slug: "n1".into(),
            status: NodeStatus::Active,
            capability_hash: None,
            config_version: Some("1".into()),
            last_seen_at: None,
            last_capability_at: None,
            config_ack_status: Some("applied".into()),
            config_ack_at: Some(Utc::now()),
            config_ack_error: None,
            worker_api_target_url: Some("http://worker:12090".into()),
            worker_api_bearer_token: Some("token".into()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn fully_configured_active_node_is_dispatchable() {
        assert!(node().is_dispatchable());
    }

    #[test]
    fn each_missing_condition_blocks_dispatch() {
        let mut n = node();
        n.status = NodeStatus::Drained;
        assert!(!n.is_dispatchable());

        let mut n = node();
        n.config_ack_status = Some("failed".into());
        assert!(!n.is_dispatchable());

        let mut n = node();
        n.config_ack_status = None;
        assert!(!n.is_dispatchable());

        let mut n = node();
        n.worker_api_target_url = Some(String::new());
        assert!(!n.is_dispatchable());

        let mut n = node();
        n.worker_api_bearer_token = None;
        assert!(!n.is_dispatchable());
    }
}
