//! User entity model and DTOs.

use cynode_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// Full user row from the `users` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct User {
    pub id: DbId,
    pub handle: String,
    pub email: Option<String>,
    pub is_active: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating a new user.
#[derive(Debug, Clone)]
pub struct CreateUser {
    pub handle: String,
    pub email: Option<String>,
}

/// A row from the `password_credentials` table.
///
/// Holds the PHC hash string -- NEVER serialize this to API responses.
#[derive(Debug, Clone, FromRow)]
pub struct PasswordCredential {
    pub id: DbId,
    pub user_id: DbId,
    pub password_hash: String,
    pub hash_algorithm: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}
