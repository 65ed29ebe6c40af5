//! Repository for the `jobs` table.
//!
//! Status transitions are guarded in the `WHERE` clause so a job moves
//! `queued -> running` and `running -> terminal` at most once.

use cynode_core::status::{JobStatus, TaskStatus};
use cynode_core::types::DbId;
use sqlx::PgPool;

use crate::models::job::{CompleteJob, Job};
use crate::repositories::TaskRepo;

/// Column list for `jobs` queries.
pub(crate) const COLUMNS: &str = "\
    id, task_id, node_id, status, payload, result, \
    started_at, ended_at, created_at, updated_at";

pub struct JobRepo;

impl JobRepo {
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Job>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM jobs WHERE id = $1");
        sqlx::query_as::<_, Job>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list_by_task(pool: &PgPool, task_id: DbId) -> Result<Vec<Job>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM jobs WHERE task_id = $1 ORDER BY created_at, id");
        sqlx::query_as::<_, Job>(&query)
            .bind(task_id)
            .fetch_all(pool)
            .await
    }

    /// The oldest queued job, FIFO by creation time then id.
    pub async fn oldest_queued(pool: &PgPool) -> Result<Option<Job>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM jobs
             WHERE status = $1
             ORDER BY created_at ASC, id ASC
             LIMIT 1"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(JobStatus::Queued.as_str())
            .fetch_optional(pool)
            .await
    }

    /// Claim a queued job for a node and mark its task running.
    ///
    /// Returns `false` (and changes nothing) if the job was no longer queued.
    pub async fn mark_running(
        pool: &PgPool,
        job_id: DbId,
        node_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let task_id: Option<DbId> = sqlx::query_scalar(
            "UPDATE jobs SET status = $3, node_id = $2, started_at = NOW()
             WHERE id = $1 AND status = $4
             RETURNING task_id",
        )
        .bind(job_id)
        .bind(node_id)
        .bind(JobStatus::Running.as_str())
        .bind(JobStatus::Queued.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(task_id) = task_id else {
            tx.rollback().await?;
            return Ok(false);
        };

        TaskRepo::set_status(&mut tx, task_id, TaskStatus::Running, None).await?;
        tx.commit().await?;
        Ok(true)
    }

    /// Record the terminal state of a running job and mirror it onto its task.
    ///
    /// Returns `false` (and changes nothing) if the job was not running.
    pub async fn complete(pool: &PgPool, input: &CompleteJob) -> Result<bool, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let task_id: Option<DbId> = sqlx::query_scalar(
            "UPDATE jobs SET status = $2, result = $3, ended_at = NOW()
             WHERE id = $1 AND status = $4
             RETURNING task_id",
        )
        .bind(input.job_id)
        .bind(input.status.as_str())
        .bind(&input.result)
        .bind(JobStatus::Running.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(task_id) = task_id else {
            tx.rollback().await?;
            return Ok(false);
        };

        TaskRepo::set_status(
            &mut tx,
            task_id,
            input.status.task_status(),
            input.summary.as_deref(),
        )
        .await?;
        tx.commit().await?;
        Ok(true)
    }
}
