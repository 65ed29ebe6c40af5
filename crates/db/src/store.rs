//! Store capability traits.
//!
//! The control plane depends on these narrow traits rather than on a
//! concrete database. [`PgStore`](crate::PgStore) backs production and
//! [`MemoryStore`](crate::MemoryStore) backs tests and local runs. Methods
//! documented as atomic must be implemented as a single transaction (or a
//! single critical section).

use async_trait::async_trait;
use cynode_core::status::NodeStatus;
use cynode_core::types::{DbId, Timestamp};

use crate::error::DbError;
use crate::models::audit::CreateAuthAuditEntry;
use crate::models::job::{CompleteJob, Job};
use crate::models::node::{CreateNode, Node, NodeCapabilitySnapshot, RecordConfigAck};
use crate::models::session::{CreateSession, RefreshSession};
use crate::models::task::{CreateTask, Task};
use crate::models::user::{CreateUser, PasswordCredential, User};

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a user. Fails with [`DbError::Conflict`] on a duplicate handle.
    async fn create_user(&self, input: &CreateUser) -> Result<User, DbError>;

    async fn find_user_by_id(&self, id: DbId) -> Result<Option<User>, DbError>;

    async fn find_user_by_handle(&self, handle: &str) -> Result<Option<User>, DbError>;

    /// Create or replace the single password credential of a user.
    async fn set_password_credential(
        &self,
        user_id: DbId,
        password_hash: &str,
        hash_algorithm: &str,
    ) -> Result<PasswordCredential, DbError>;

    async fn find_password_credential(
        &self,
        user_id: DbId,
    ) -> Result<Option<PasswordCredential>, DbError>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create_session(&self, input: &CreateSession) -> Result<RefreshSession, DbError>;

    /// Find a usable (active, unexpired) session by refresh-token hash.
    async fn find_active_session_by_hash(
        &self,
        hash: &str,
    ) -> Result<Option<RefreshSession>, DbError>;

    /// Atomically deactivate `old_id` and insert `input`.
    ///
    /// Returns [`DbError::NotFound`] when `old_id` is no longer usable, in
    /// which case nothing is inserted.
    async fn rotate_session(
        &self,
        old_id: DbId,
        input: &CreateSession,
    ) -> Result<RefreshSession, DbError>;

    /// Deactivate a session. Returns `true` if it was active.
    async fn invalidate_session(&self, id: DbId) -> Result<bool, DbError>;
}

#[async_trait]
pub trait NodeStore: Send + Sync {
    async fn find_node_by_id(&self, id: DbId) -> Result<Option<Node>, DbError>;

    async fn find_node_by_slug(&self, slug: &str) -> Result<Option<Node>, DbError>;

    /// Insert a node. Fails with [`DbError::Conflict`] on a duplicate slug.
    async fn create_node(&self, input: &CreateNode) -> Result<Node, DbError>;

    async fn set_node_status(&self, id: DbId, status: NodeStatus) -> Result<(), DbError>;

    /// Bump `last_seen_at` and re-activate the node if it was `inactive`.
    async fn record_node_seen(&self, id: DbId) -> Result<(), DbError>;

    /// Return the node's config version, assigning `initial` if it has none.
    async fn ensure_config_version(&self, id: DbId, initial: &str) -> Result<String, DbError>;

    /// Persist the worker-API target the dispatcher uses to reach the node.
    async fn set_worker_api(&self, id: DbId, target_url: &str, bearer_token: &str)
        -> Result<(), DbError>;

    async fn record_config_ack(&self, id: DbId, ack: &RecordConfigAck) -> Result<(), DbError>;

    /// Append a capability snapshot (write-only history).
    async fn insert_capability_snapshot(
        &self,
        node_id: DbId,
        capability: &serde_json::Value,
    ) -> Result<NodeCapabilitySnapshot, DbError>;

    /// Store the latest capability hash and bump `last_capability_at`.
    async fn set_capability_hash(&self, id: DbId, hash: &str) -> Result<(), DbError>;

    /// Nodes satisfying [`Node::is_dispatchable`], ordered by slug.
    async fn list_dispatchable_nodes(&self) -> Result<Vec<Node>, DbError>;

    /// Mark `active` nodes last seen before `cutoff` as `inactive`.
    async fn mark_stale_nodes_inactive(&self, cutoff: Timestamp) -> Result<u64, DbError>;
}

#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Atomically insert a pending task and its single queued job.
    async fn create_task_with_job(&self, input: &CreateTask) -> Result<(Task, Job), DbError>;

    async fn find_task(&self, id: DbId) -> Result<Option<Task>, DbError>;

    /// Jobs of a task in creation order.
    async fn list_jobs_for_task(&self, task_id: DbId) -> Result<Vec<Job>, DbError>;
}

#[async_trait]
pub trait JobStore: Send + Sync {
    /// The oldest queued job (FIFO by creation time, then id).
    async fn oldest_queued_job(&self) -> Result<Option<Job>, DbError>;

    async fn find_job(&self, id: DbId) -> Result<Option<Job>, DbError>;

    /// Atomically move a queued job to running on `node_id` and mark its
    /// task running. Returns `false` if the job was no longer queued.
    async fn mark_job_running(&self, job_id: DbId, node_id: DbId) -> Result<bool, DbError>;

    /// Atomically record the terminal state of a running job and mirror it
    /// onto the task. Returns `false` if the job was not running.
    async fn complete_job(&self, input: &CompleteJob) -> Result<bool, DbError>;
}

#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn record_auth_event(&self, entry: &CreateAuthAuditEntry) -> Result<(), DbError>;
}

/// Everything the control plane needs from persistence.
#[async_trait]
pub trait Store: UserStore + SessionStore + NodeStore + TaskStore + JobStore + AuditStore {
    /// Cheap reachability probe used by the health endpoint.
    async fn ping(&self) -> Result<(), DbError>;
}
