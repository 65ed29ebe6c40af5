//! PostgreSQL-backed [`Store`] built on the repositories.

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
use crate::repositories::{AuditRepo, JobRepo, NodeRepo, SessionRepo, TaskRepo, UserRepo};
use crate::store::{AuditStore, JobStore, NodeStore, SessionStore, Store, TaskStore, UserStore};
use crate::DbPool;

/// Production store over a shared connection pool.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

fn found(updated: bool) -> Result<(), DbError> {
    if updated {
        Ok(())
    } else {
        Err(DbError::NotFound)
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn create_user(&self, input: &CreateUser) -> Result<User, DbError> {
        Ok(UserRepo::create(&self.pool, input).await?)
    }

    async fn find_user_by_id(&self, id: DbId) -> Result<Option<User>, DbError> {
        Ok(UserRepo::find_by_id(&self.pool, id).await?)
    }

    async fn find_user_by_handle(&self, handle: &str) -> Result<Option<User>, DbError> {
        Ok(UserRepo::find_by_handle(&self.pool, handle).await?)
    }

    async fn set_password_credential(
        &self,
        user_id: DbId,
        password_hash: &str,
        hash_algorithm: &str,
    ) -> Result<PasswordCredential, DbError> {
        Ok(UserRepo::upsert_credential(&self.pool, user_id, password_hash, hash_algorithm).await?)
    }

    async fn find_password_credential(
        &self,
        user_id: DbId,
    ) -> Result<Option<PasswordCredential>, DbError> {
        Ok(UserRepo::find_credential(&self.pool, user_id).await?)
    }
}

#[async_trait]
impl SessionStore for PgStore {
    async fn create_session(&self, input: &CreateSession) -> Result<RefreshSession, DbError> {
        let mut conn = self.pool.acquire().await?;
        Ok(SessionRepo::create(&mut conn, input).await?)
    }

    async fn find_active_session_by_hash(
        &self,
        hash: &str,
    ) -> Result<Option<RefreshSession>, DbError> {
        Ok(SessionRepo::find_active_by_hash(&self.pool, hash).await?)
    }

    async fn rotate_session(
        &self,
        old_id: DbId,
        input: &CreateSession,
    ) -> Result<RefreshSession, DbError> {
        let mut tx = self.pool.begin().await?;
        if !SessionRepo::deactivate_usable(&mut tx, old_id).await? {
            tx.rollback().await?;
            return Err(DbError::NotFound);
        }
        let session = SessionRepo::create(&mut tx, input).await?;
        tx.commit().await?;
        Ok(session)
    }

    async fn invalidate_session(&self, id: DbId) -> Result<bool, DbError> {
        Ok(SessionRepo::deactivate(&self.pool, id).await?)
    }
}

#[async_trait]
impl NodeStore for PgStore {
    async fn find_node_by_id(&self, id: DbId) -> Result<Option<Node>, DbError> {
        Ok(NodeRepo::find_by_id(&self.pool, id).await?)
    }

    async fn find_node_by_slug(&self, slug: &str) -> Result<Option<Node>, DbError> {
        Ok(NodeRepo::find_by_slug(&self.pool, slug).await?)
    }

    async fn create_node(&self, input: &CreateNode) -> Result<Node, DbError> {
        Ok(NodeRepo::create(&self.pool, input).await?)
    }

    async fn set_node_status(&self, id: DbId, status: NodeStatus) -> Result<(), DbError> {
        found(NodeRepo::set_status(&self.pool, id, status).await?)
    }

    async fn record_node_seen(&self, id: DbId) -> Result<(), DbError> {
        found(NodeRepo::touch(&self.pool, id).await?)
    }

    async fn ensure_config_version(&self, id: DbId, initial: &str) -> Result<String, DbError> {
        NodeRepo::ensure_config_version(&self.pool, id, initial)
            .await?
            .ok_or(DbError::NotFound)
    }

    async fn set_worker_api(
        &self,
        id: DbId,
        target_url: &str,
        bearer_token: &str,
    ) -> Result<(), DbError> {
        found(NodeRepo::set_worker_api(&self.pool, id, target_url, bearer_token).await?)
    }

    async fn record_config_ack(&self, id: DbId, ack: &RecordConfigAck) -> Result<(), DbError> {
        found(NodeRepo::record_config_ack(&self.pool, id, ack).await?)
    }

    async fn insert_capability_snapshot(
        &self,
        node_id: DbId,
        capability: &serde_json::Value,
    ) -> Result<NodeCapabilitySnapshot, DbError> {
        Ok(NodeRepo::insert_snapshot(&self.pool, node_id, capability).await?)
    }

    async fn set_capability_hash(&self, id: DbId, hash: &str) -> Result<(), DbError> {
        found(NodeRepo::set_capability_hash(&self.pool, id, hash).await?)
    }

    async fn list_dispatchable_nodes(&self) -> Result<Vec<Node>, DbError> {
        Ok(NodeRepo::list_dispatchable(&self.pool).await?)
    }

    async fn mark_stale_nodes_inactive(&self, cutoff: Timestamp) -> Result<u64, DbError> {
        Ok(NodeRepo::mark_stale_inactive(&self.pool, cutoff).await?)
    }
}

#[async_trait]
impl TaskStore for PgStore {
    async fn create_task_with_job(&self, input: &CreateTask) -> Result<(Task, Job), DbError> {
        Ok(TaskRepo::create_with_job(&self.pool, input).await?)
    }

    async fn find_task(&self, id: DbId) -> Result<Option<Task>, DbError> {
        Ok(TaskRepo::find_by_id(&self.pool, id).await?)
    }

    async fn list_jobs_for_task(&self, task_id: DbId) -> Result<Vec<Job>, DbError> {
        Ok(JobRepo::list_by_task(&self.pool, task_id).await?)
    }
}

#[async_trait]
impl JobStore for PgStore {
    async fn oldest_queued_job(&self) -> Result<Option<Job>, DbError> {
        Ok(JobRepo::oldest_queued(&self.pool).await?)
    }

    async fn find_job(&self, id: DbId) -> Result<Option<Job>, DbError> {
        Ok(JobRepo::find_by_id(&self.pool, id).await?)
    }

    async fn mark_job_running(&self, job_id: DbId, node_id: DbId) -> Result<bool, DbError> {
        Ok(JobRepo::mark_running(&self.pool, job_id, node_id).await?)
    }

    async fn complete_job(&self, input: &CompleteJob) -> Result<bool, DbError> {
        Ok(JobRepo::complete(&self.pool, input).await?)
    }
}

#[async_trait]
impl AuditStore for PgStore {
    async fn record_auth_event(&self, entry: &CreateAuthAuditEntry) -> Result<(), DbError> {
        Ok(AuditRepo::insert(&self.pool, entry).await?)
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> Result<(), DbError> {
        Ok(crate::health_check(&self.pool).await?)
    }
}
