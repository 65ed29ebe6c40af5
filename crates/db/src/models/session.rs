//! Refresh session model and DTOs.

use chrono::Utc;
use cynode_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// A refresh session row from the `refresh_sessions` table.
///
/// Only the SHA-256 hash of the refresh token is stored.
#[derive(Debug, Clone, FromRow)]
pub struct RefreshSession {
    pub id: DbId,
    pub user_id: DbId,
    pub refresh_token_hash: String,
    pub is_active: bool,
    pub expires_at: Timestamp,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl RefreshSession {
    /// A session is usable iff active and not expired.
    pub fn is_usable(&self) -> bool {
        self.is_active && self.expires_at > Utc::now()
    }
}

/// DTO for creating a new refresh session.
#[derive(Debug, Clone)]
pub struct CreateSession {
    pub user_id: DbId,
    pub refresh_token_hash: String,
    pub expires_at: Timestamp,
}
