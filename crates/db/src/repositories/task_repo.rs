//! Repository for the `tasks` table.

use cynode_core::status::{JobStatus, TaskStatus};
use cynode_core::types::DbId;
use sqlx::{PgConnection, PgPool};

use crate::models::job::Job;
use crate::models::task::{CreateTask, Task};
use crate::repositories::job_repo;

/// Column list for `tasks` queries.
const COLUMNS: &str = "id, created_by, status, prompt, summary, created_at, updated_at";

pub struct TaskRepo;

impl TaskRepo {
    /// Insert a pending task and its single queued job in one transaction.
    pub async fn create_with_job(
        pool: &PgPool,
        input: &CreateTask,
    ) -> Result<(Task, Job), sqlx::Error> {
        let mut tx = pool.begin().await?;

        let query = format!(
            "INSERT INTO tasks (id, created_by, status, prompt)
             VALUES ($1, $2, $3, $4)
             RETURNING {COLUMNS}"
        );
        let task = sqlx::query_as::<_, Task>(&query)
            .bind(DbId::now_v7())
            .bind(input.created_by)
            .bind(TaskStatus::Pending.as_str())
            .bind(&input.prompt)
            .fetch_one(&mut *tx)
            .await?;

        let query = format!(
            "INSERT INTO jobs (id, task_id, status, payload)
             VALUES ($1, $2, $3, $4)
             RETURNING {}",
            job_repo::COLUMNS
        );
        let job = sqlx::query_as::<_, Job>(&query)
            .bind(DbId::now_v7())
            .bind(task.id)
            .bind(JobStatus::Queued.as_str())
            .bind(&input.job_payload)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok((task, job))
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Task>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM tasks WHERE id = $1");
        sqlx::query_as::<_, Task>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Set the task status, and the summary when one is given.
    pub async fn set_status(
        conn: &mut PgConnection,
        id: DbId,
        status: TaskStatus,
        summary: Option<&str>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE tasks SET status = $2, summary = COALESCE($3, summary) WHERE id = $1",
        )
        .bind(id)
        .bind(status.as_str())
        .bind(summary)
        .execute(conn)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
