//! In-memory [`Store`] for tests and single-process development runs.
//!
//! All state lives behind one mutex, so every method is trivially atomic.
//! The lock is never held across an `.await`.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use cynode_core::status::{JobStatus, NodeStatus, TaskStatus};
use cynode_core::types::{DbId, Timestamp};

use crate::error::DbError;
use crate::models::audit::{AuthAuditEntry, CreateAuthAuditEntry};
use crate::models::job::{CompleteJob, Job};
use crate::models::node::{CreateNode, Node, NodeCapabilitySnapshot, RecordConfigAck};
use crate::models::session::{CreateSession, RefreshSession};
use crate::models::task::{CreateTask, Task};
use crate::models::user::{CreateUser, PasswordCredential, User};
use crate::store::{AuditStore, JobStore, NodeStore, SessionStore, Store, TaskStore, UserStore};

#[derive(Default)]
struct State {
    users: HashMap<DbId, User>,
    credentials: HashMap<DbId, PasswordCredential>,
    sessions: HashMap<DbId, RefreshSession>,
    nodes: HashMap<DbId, Node>,
    snapshots: Vec<NodeCapabilitySnapshot>,
    tasks: HashMap<DbId, Task>,
    /// Insertion order doubles as creation order.
    jobs: Vec<Job>,
    audit: Vec<AuthAuditEntry>,
}

impl State {
    fn node_mut(&mut self, id: DbId) -> Result<&mut Node, DbError> {
        self.nodes.get_mut(&id).ok_or(DbError::NotFound)
    }

    fn set_task_status(&mut self, id: DbId, status: TaskStatus, summary: Option<&str>) {
        if let Some(task) = self.tasks.get_mut(&id) {
            task.status = status;
            if let Some(summary) = summary {
                task.summary = Some(summary.to_string());
            }
            task.updated_at = Utc::now();
        }
    }
}

/// Mutex-guarded store with the same semantics as [`PgStore`](crate::PgStore).
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // Poisoned state is still consistent; every write is a whole field.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Number of usable refresh sessions belonging to `user_id`.
    pub fn count_active_sessions(&self, user_id: DbId) -> usize {
        self.lock()
            .sessions
            .values()
            .filter(|s| s.user_id == user_id && s.is_usable())
            .count()
    }

    /// Capability snapshots recorded for a node, oldest first.
    pub fn capability_snapshots(&self, node_id: DbId) -> Vec<NodeCapabilitySnapshot> {
        self.lock()
            .snapshots
            .iter()
            .filter(|s| s.node_id == node_id)
            .cloned()
            .collect()
    }

    /// Every audit entry written so far, oldest first.
    pub fn audit_entries(&self) -> Vec<AuthAuditEntry> {
        self.lock().audit.clone()
    }

    /// Overwrite a node's `last_seen_at`.
    pub fn set_node_last_seen(&self, id: DbId, at: Timestamp) {
        if let Some(node) = self.lock().nodes.get_mut(&id) {
            node.last_seen_at = Some(at);
        }
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_user(&self, input: &CreateUser) -> Result<User, DbError> {
        let mut state = self.lock();
        if state.users.values().any(|u| u.handle == input.handle) {
            return Err(DbError::Conflict("uq_users_handle".into()));
        }
        let now = Utc::now();
        let user = User {
            id: DbId::new_v4(),
            handle: input.handle.clone(),
            email: input.email.clone(),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user_by_id(&self, id: DbId) -> Result<Option<User>, DbError> {
        Ok(self.lock().users.get(&id).cloned())
    }

    async fn find_user_by_handle(&self, handle: &str) -> Result<Option<User>, DbError> {
        Ok(self
            .lock()
            .users
            .values()
            .find(|u| u.handle == handle)
            .cloned())
    }

    async fn set_password_credential(
        &self,
        user_id: DbId,
        password_hash: &str,
        hash_algorithm: &str,
    ) -> Result<PasswordCredential, DbError> {
        let mut state = self.lock();
        if !state.users.contains_key(&user_id) {
            return Err(DbError::NotFound);
        }
        let now = Utc::now();
        let credential = match state.credentials.get(&user_id) {
            Some(existing) => PasswordCredential {
                password_hash: password_hash.to_string(),
                hash_algorithm: hash_algorithm.to_string(),
                updated_at: now,
                ..existing.clone()
            },
            None => PasswordCredential {
                id: DbId::new_v4(),
                user_id,
                password_hash: password_hash.to_string(),
                hash_algorithm: hash_algorithm.to_string(),
                created_at: now,
                updated_at: now,
            },
        };
        state.credentials.insert(user_id, credential.clone());
        Ok(credential)
    }

    async fn find_password_credential(
        &self,
        user_id: DbId,
    ) -> Result<Option<PasswordCredential>, DbError> {
        Ok(self.lock().credentials.get(&user_id).cloned())
    }
}

fn new_session(input: &CreateSession) -> RefreshSession {
    let now = Utc::now();
    RefreshSession {
        id: DbId::new_v4(),
        user_id: input.user_id,
        refresh_token_hash: input.refresh_token_hash.clone(),
        is_active: true,
        expires_at: input.expires_at,
        created_at: now,
        updated_at: now,
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn create_session(&self, input: &CreateSession) -> Result<RefreshSession, DbError> {
        let session = new_session(input);
        self.lock().sessions.insert(session.id, session.clone());
        Ok(session)
    }

    async fn find_active_session_by_hash(
        &self,
        hash: &str,
    ) -> Result<Option<RefreshSession>, DbError> {
        Ok(self
            .lock()
            .sessions
            .values()
            .find(|s| s.refresh_token_hash == hash && s.is_usable())
            .cloned())
    }

    async fn rotate_session(
        &self,
        old_id: DbId,
        input: &CreateSession,
    ) -> Result<RefreshSession, DbError> {
        let mut state = self.lock();
        let old = state
            .sessions
            .get_mut(&old_id)
            .filter(|s| s.is_usable())
            .ok_or(DbError::NotFound)?;
        old.is_active = false;
        old.updated_at = Utc::now();

        let session = new_session(input);
        state.sessions.insert(session.id, session.clone());
        Ok(session)
    }

    async fn invalidate_session(&self, id: DbId) -> Result<bool, DbError> {
        let mut state = self.lock();
        match state.sessions.get_mut(&id) {
            Some(session) if session.is_active => {
                session.is_active = false;
                session.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl NodeStore for MemoryStore {
    async fn find_node_by_id(&self, id: DbId) -> Result<Option<Node>, DbError> {
        Ok(self.lock().nodes.get(&id).cloned())
    }

    async fn find_node_by_slug(&self, slug: &str) -> Result<Option<Node>, DbError> {
        Ok(self
            .lock()
            .nodes
            .values()
            .find(|n| n.node_slug == slug)
            .cloned())
    }

    async fn create_node(&self, input: &CreateNode) -> Result<Node, DbError> {
        let mut state = self.lock();
        if state.nodes.values().any(|n| n.node_slug == input.node_slug) {
            return Err(DbError::Conflict("uq_nodes_slug".into()));
        }
        let now = Utc::now();
        let node = Node {
            id: DbId::new_v4(),
            node_slug: input.node_slug.clone(),
            status: input.status,
            capability_hash: None,
            config_version: input.config_version.clone(),
            last_seen_at: Some(now),
            last_capability_at: None,
            config_ack_status: None,
            config_ack_at: None,
            config_ack_error: None,
            worker_api_target_url: None,
            worker_api_bearer_token: None,
            created_at: now,
            updated_at: now,
        };
        state.nodes.insert(node.id, node.clone());
        Ok(node)
    }

    async fn set_node_status(&self, id: DbId, status: NodeStatus) -> Result<(), DbError> {
        let mut state = self.lock();
        let node = state.node_mut(id)?;
        node.status = status;
        node.updated_at = Utc::now();
        Ok(())
    }

    async fn record_node_seen(&self, id: DbId) -> Result<(), DbError> {
        let mut state = self.lock();
        let node = state.node_mut(id)?;
        let now = Utc::now();
        node.last_seen_at = Some(now);
        if node.status == NodeStatus::Inactive {
            node.status = NodeStatus::Active;
        }
        node.updated_at = now;
        Ok(())
    }

    async fn ensure_config_version(&self, id: DbId, initial: &str) -> Result<String, DbError> {
        let mut state = self.lock();
        let node = state.node_mut(id)?;
        Ok(node
            .config_version
            .get_or_insert_with(|| initial.to_string())
            .clone())
    }

    async fn set_worker_api(
        &self,
        id: DbId,
        target_url: &str,
        bearer_token: &str,
    ) -> Result<(), DbError> {
        let mut state = self.lock();
        let node = state.node_mut(id)?;
        node.worker_api_target_url = Some(target_url.to_string());
        node.worker_api_bearer_token = Some(bearer_token.to_string());
        node.updated_at = Utc::now();
        Ok(())
    }

    async fn record_config_ack(&self, id: DbId, ack: &RecordConfigAck) -> Result<(), DbError> {
        let mut state = self.lock();
        let node = state.node_mut(id)?;
        let now = Utc::now();
        node.config_version = Some(ack.config_version.clone());
        node.config_ack_status = Some(ack.status.as_str().to_string());
        node.config_ack_at = Some(ack.ack_at);
        node.config_ack_error = ack.error.clone();
        node.last_seen_at = Some(now);
        node.updated_at = now;
        Ok(())
    }

    async fn insert_capability_snapshot(
        &self,
        node_id: DbId,
        capability: &serde_json::Value,
    ) -> Result<NodeCapabilitySnapshot, DbError> {
        let mut state = self.lock();
        if !state.nodes.contains_key(&node_id) {
            return Err(DbError::NotFound);
        }
        let snapshot = NodeCapabilitySnapshot {
            id: DbId::new_v4(),
            node_id,
            captured_at: Utc::now(),
            capability_json: capability.clone(),
        };
        state.snapshots.push(snapshot.clone());
        Ok(snapshot)
    }

    async fn set_capability_hash(&self, id: DbId, hash: &str) -> Result<(), DbError> {
        let mut state = self.lock();
        let node = state.node_mut(id)?;
        let now = Utc::now();
        node.capability_hash = Some(hash.to_string());
        node.last_capability_at = Some(now);
        node.updated_at = now;
        Ok(())
    }

    async fn list_dispatchable_nodes(&self) -> Result<Vec<Node>, DbError> {
        let mut nodes: Vec<Node> = self
            .lock()
            .nodes
            .values()
            .filter(|n| n.is_dispatchable())
            .cloned()
            .collect();
        nodes.sort_by(|a, b| a.node_slug.cmp(&b.node_slug));
        Ok(nodes)
    }

    async fn mark_stale_nodes_inactive(&self, cutoff: Timestamp) -> Result<u64, DbError> {
        let mut state = self.lock();
        let mut count = 0;
        for node in state.nodes.values_mut() {
            let stale = node.last_seen_at.is_none_or(|seen| seen < cutoff);
            if node.status == NodeStatus::Active && stale {
                node.status = NodeStatus::Inactive;
                node.updated_at = Utc::now();
                count += 1;
            }
        }
        Ok(count)
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn create_task_with_job(&self, input: &CreateTask) -> Result<(Task, Job), DbError> {
        let mut state = self.lock();
        let now = Utc::now();
        let task = Task {
            id: DbId::now_v7(),
            created_by: input.created_by,
            status: TaskStatus::Pending,
            prompt: Some(input.prompt.clone()),
            summary: None,
            created_at: now,
            updated_at: now,
        };
        let job = Job {
            id: DbId::now_v7(),
            task_id: task.id,
            node_id: None,
            status: JobStatus::Queued,
            payload: Some(input.job_payload.clone()),
            result: None,
            started_at: None,
            ended_at: None,
            created_at: now,
            updated_at: now,
        };
        state.tasks.insert(task.id, task.clone());
        state.jobs.push(job.clone());
        Ok((task, job))
    }

    async fn find_task(&self, id: DbId) -> Result<Option<Task>, DbError> {
        Ok(self.lock().tasks.get(&id).cloned())
    }

    async fn list_jobs_for_task(&self, task_id: DbId) -> Result<Vec<Job>, DbError> {
        Ok(self
            .lock()
            .jobs
            .iter()
            .filter(|j| j.task_id == task_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn oldest_queued_job(&self) -> Result<Option<Job>, DbError> {
        Ok(self
            .lock()
            .jobs
            .iter()
            .find(|j| j.status == JobStatus::Queued)
            .cloned())
    }

    async fn find_job(&self, id: DbId) -> Result<Option<Job>, DbError> {
        Ok(self.lock().jobs.iter().find(|j| j.id == id).cloned())
    }

    async fn mark_job_running(&self, job_id: DbId, node_id: DbId) -> Result<bool, DbError> {
        let mut state = self.lock();
        let Some(job) = state
            .jobs
            .iter_mut()
            .find(|j| j.id == job_id && j.status == JobStatus::Queued)
        else {
            return Ok(false);
        };
        let now = Utc::now();
        job.status = JobStatus::Running;
        job.node_id = Some(node_id);
        job.started_at = Some(now);
        job.updated_at = now;
        let task_id = job.task_id;
        state.set_task_status(task_id, TaskStatus::Running, None);
        Ok(true)
    }

    async fn complete_job(&self, input: &CompleteJob) -> Result<bool, DbError> {
        let mut state = self.lock();
        let Some(job) = state
            .jobs
            .iter_mut()
            .find(|j| j.id == input.job_id && j.status == JobStatus::Running)
        else {
            return Ok(false);
        };
        let now = Utc::now();
        job.status = input.status;
        job.result = Some(input.result.clone());
        job.ended_at = Some(now);
        job.updated_at = now;
        let task_id = job.task_id;
        state.set_task_status(task_id, input.status.task_status(), input.summary.as_deref());
        Ok(true)
    }
}

#[async_trait]
impl AuditStore for MemoryStore {
    async fn record_auth_event(&self, entry: &CreateAuthAuditEntry) -> Result<(), DbError> {
        self.lock().audit.push(AuthAuditEntry {
            id: DbId::new_v4(),
            user_id: entry.user_id,
            event_type: entry.event_type.to_string(),
            success: entry.success,
            ip_address: entry.ip_address.clone(),
            user_agent: entry.user_agent.clone(),
            details: entry.details.clone(),
            created_at: Utc::now(),
        });
        Ok(())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), DbError> {
        Ok(())
    }
}
