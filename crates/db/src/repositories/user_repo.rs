//! Repository for the `users` and `password_credentials` tables.

use cynode_core::types::DbId;
use sqlx::PgPool;

use crate::models::user::{CreateUser, PasswordCredential, User};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, handle, email, is_active, created_at, updated_at";

const CREDENTIAL_COLUMNS: &str =
    "id, user_id, password_hash, hash_algorithm, created_at, updated_at";

/// Provides operations for users and their password credentials.
pub struct UserRepo;

impl UserRepo {
    /// Insert a new user, returning the created row.
    pub async fn create(pool: &PgPool, input: &CreateUser) -> Result<User, sqlx::Error> {
        let query = format!(
            "INSERT INTO users (id, handle, email)
             VALUES ($1, $2, $3)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, User>(&query)
            .bind(DbId::new_v4())
            .bind(&input.handle)
            .bind(&input.email)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<User>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_handle(pool: &PgPool, handle: &str) -> Result<Option<User>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM users WHERE handle = $1");
        sqlx::query_as::<_, User>(&query)
            .bind(handle)
            .fetch_optional(pool)
            .await
    }

    /// Insert or replace the user's password credential.
    pub async fn upsert_credential(
        pool: &PgPool,
        user_id: DbId,
        password_hash: &str,
        hash_algorithm: &str,
    ) -> Result<PasswordCredential, sqlx::Error> {
        let query = format!(
            "INSERT INTO password_credentials (id, user_id, password_hash, hash_algorithm)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (user_id) DO UPDATE
                SET password_hash = EXCLUDED.password_hash,
                    hash_algorithm = EXCLUDED.hash_algorithm
             RETURNING {CREDENTIAL_COLUMNS}"
        );
        sqlx::query_as::<_, PasswordCredential>(&query)
            .bind(DbId::new_v4())
            .bind(user_id)
            .bind(password_hash)
            .bind(hash_algorithm)
            .fetch_one(pool)
            .await
    }

    pub async fn find_credential(
        pool: &PgPool,
        user_id: DbId,
    ) -> Result<Option<PasswordCredential>, sqlx::Error> {
        let query =
            format!("SELECT {CREDENTIAL_COLUMNS} FROM password_credentials WHERE user_id = $1");
        sqlx::query_as::<_, PasswordCredential>(&query)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }
}
