//! Repository for the `refresh_sessions` table.

use cynode_core::types::DbId;
use sqlx::{PgConnection, PgPool};

use crate::models::session::{CreateSession, RefreshSession};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, user_id, refresh_token_hash, is_active, expires_at, \
                       created_at, updated_at";

/// Provides CRUD operations for refresh sessions.
pub struct SessionRepo;

impl SessionRepo {
    /// Insert a new session, returning the created row.
    pub async fn create(
        conn: &mut PgConnection,
        input: &CreateSession,
    ) -> Result<RefreshSession, sqlx::Error> {
        let query = format!(
            "INSERT INTO refresh_sessions (id, user_id, refresh_token_hash, expires_at)
             VALUES ($1, $2, $3, $4)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, RefreshSession>(&query)
            .bind(DbId::new_v4())
            .bind(input.user_id)
            .bind(&input.refresh_token_hash)
            .bind(input.expires_at)
            .fetch_one(conn)
            .await
    }

    /// Find an active session by its refresh token hash.
    ///
    /// Only returns sessions that are active and not expired.
    pub async fn find_active_by_hash(
        pool: &PgPool,
        hash: &str,
    ) -> Result<Option<RefreshSession>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM refresh_sessions
             WHERE refresh_token_hash = $1
               AND is_active = true
               AND expires_at > NOW()"
        );
        sqlx::query_as::<_, RefreshSession>(&query)
            .bind(hash)
            .fetch_optional(pool)
            .await
    }

    /// Deactivate a usable session. Returns `true` if the row was updated.
    pub async fn deactivate_usable(
        conn: &mut PgConnection,
        id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE refresh_sessions SET is_active = false
             WHERE id = $1 AND is_active = true AND expires_at > NOW()",
        )
        .bind(id)
        .execute(conn)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Deactivate a session regardless of expiry. Returns `true` if it was active.
    pub async fn deactivate(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE refresh_sessions SET is_active = false WHERE id = $1 AND is_active = true",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
