//! Job entity model and DTOs.

use cynode_core::status::JobStatus;
use cynode_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A job row from the `jobs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Job {
    pub id: DbId,
    pub task_id: DbId,
    pub node_id: Option<DbId>,
    #[sqlx(try_from = "String")]
    pub status: JobStatus,
    /// Opaque payload; the dispatcher parses it as a sandbox spec.
    pub payload: Option<String>,
    pub result: Option<serde_json::Value>,
    pub started_at: Option<Timestamp>,
    pub ended_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for the single running -> terminal transition.
#[derive(Debug, Clone)]
pub struct CompleteJob {
    pub job_id: DbId,
    pub status: JobStatus,
    pub result: serde_json::Value,
    /// Written onto the owning task; `None` leaves the summary untouched.
    pub summary: Option<String>,
}
