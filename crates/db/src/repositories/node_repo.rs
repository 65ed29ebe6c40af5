//! Repository for the `nodes` and `node_capabilities` tables.

use cynode_core::status::{ConfigAckStatus, NodeStatus};
use cynode_core::types::{DbId, Timestamp};
use sqlx::PgPool;

use crate::models::node::{CreateNode, Node, NodeCapabilitySnapshot, RecordConfigAck};

/// Column list for `nodes` queries.
const COLUMNS: &str = "\
    id, node_slug, status, capability_hash, config_version, \
    last_seen_at, last_capability_at, \
    config_ack_status, config_ack_at, config_ack_error, \
    worker_api_target_url, worker_api_bearer_token, \
    created_at, updated_at";

const SNAPSHOT_COLUMNS: &str = "id, node_id, captured_at, capability_json";

/// Provides operations for worker nodes and their capability history.
pub struct NodeRepo;

impl NodeRepo {
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Node>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM nodes WHERE id = $1");
        sqlx::query_as::<_, Node>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_slug(pool: &PgPool, slug: &str) -> Result<Option<Node>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM nodes WHERE node_slug = $1");
        sqlx::query_as::<_, Node>(&query)
            .bind(slug)
            .fetch_optional(pool)
            .await
    }

    /// Insert a new node, stamping `last_seen_at`.
    pub async fn create(pool: &PgPool, input: &CreateNode) -> Result<Node, sqlx::Error> {
        let query = format!(
            "INSERT INTO nodes (id, node_slug, status, config_version, last_seen_at)
             VALUES ($1, $2, $3, $4, NOW())
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Node>(&query)
            .bind(DbId::new_v4())
            .bind(&input.node_slug)
            .bind(input.status.as_str())
            .bind(&input.config_version)
            .fetch_one(pool)
            .await
    }

    pub async fn set_status(
        pool: &PgPool,
        id: DbId,
        status: NodeStatus,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE nodes SET status = $2 WHERE id = $1")
            .bind(id)
            .bind(status.as_str())
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Bump `last_seen_at`; an `inactive` node comes back as `active`.
    pub async fn touch(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE nodes
             SET last_seen_at = NOW(),
                 status = CASE WHEN status = $2 THEN $3 ELSE status END
             WHERE id = $1",
        )
        .bind(id)
        .bind(NodeStatus::Inactive.as_str())
        .bind(NodeStatus::Active.as_str())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Assign `initial` as config version if unset and return the effective value.
    pub async fn ensure_config_version(
        pool: &PgPool,
        id: DbId,
        initial: &str,
    ) -> Result<Option<String>, sqlx::Error> {
        let version: Option<Option<String>> = sqlx::query_scalar(
            "UPDATE nodes SET config_version = COALESCE(config_version, $2)
             WHERE id = $1
             RETURNING config_version",
        )
        .bind(id)
        .bind(initial)
        .fetch_optional(pool)
        .await?;
        Ok(version.flatten())
    }

    pub async fn set_worker_api(
        pool: &PgPool,
        id: DbId,
        target_url: &str,
        bearer_token: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE nodes SET worker_api_target_url = $2, worker_api_bearer_token = $3
             WHERE id = $1",
        )
        .bind(id)
        .bind(target_url)
        .bind(bearer_token)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn record_config_ack(
        pool: &PgPool,
        id: DbId,
        ack: &RecordConfigAck,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE nodes
             SET config_version = $2,
                 config_ack_status = $3,
                 config_ack_at = $4,
                 config_ack_error = $5,
                 last_seen_at = NOW()
             WHERE id = $1",
        )
        .bind(id)
        .bind(&ack.config_version)
        .bind(ack.status.as_str())
        .bind(ack.ack_at)
        .bind(&ack.error)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn insert_snapshot(
        pool: &PgPool,
        node_id: DbId,
        capability: &serde_json::Value,
    ) -> Result<NodeCapabilitySnapshot, sqlx::Error> {
        let query = format!(
            "INSERT INTO node_capabilities (id, node_id, capability_json)
             VALUES ($1, $2, $3)
             RETURNING {SNAPSHOT_COLUMNS}"
        );
        sqlx::query_as::<_, NodeCapabilitySnapshot>(&query)
            .bind(DbId::new_v4())
            .bind(node_id)
            .bind(capability)
            .fetch_one(pool)
            .await
    }

    pub async fn set_capability_hash(
        pool: &PgPool,
        id: DbId,
        hash: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE nodes SET capability_hash = $2, last_capability_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(hash)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Active nodes with an applied config and a usable worker API, ordered by slug.
    pub async fn list_dispatchable(pool: &PgPool) -> Result<Vec<Node>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM nodes
             WHERE status = $1
               AND config_ack_status = $2
               AND COALESCE(worker_api_target_url, '') <> ''
               AND COALESCE(worker_api_bearer_token, '') <> ''
             ORDER BY node_slug"
        );
        sqlx::query_as::<_, Node>(&query)
            .bind(NodeStatus::Active.as_str())
            .bind(ConfigAckStatus::Applied.as_str())
            .fetch_all(pool)
            .await
    }

    /// Mark `active` nodes not seen since `cutoff` as `inactive`.
    pub async fn mark_stale_inactive(pool: &PgPool, cutoff: Timestamp) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE nodes SET status = $1
             WHERE status = $2 AND (last_seen_at IS NULL OR last_seen_at < $3)",
        )
        .bind(NodeStatus::Inactive.as_str())
        .bind(NodeStatus::Active.as_str())
        .bind(cutoff)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
