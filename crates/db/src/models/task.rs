//! Task entity model and DTOs.

use cynode_core::status::TaskStatus;
use cynode_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A task row from the `tasks` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Task {
    pub id: DbId,
    pub created_by: Option<DbId>,
    #[sqlx(try_from = "String")]
    pub status: TaskStatus,
    pub prompt: Option<String>,
    pub summary: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating a task together with its single queued job.
#[derive(Debug, Clone)]
pub struct CreateTask {
    pub created_by: Option<DbId>,
    pub prompt: String,
    /// Serialized sandbox spec stored verbatim as the job payload.
    pub job_payload: String,
}
