//! Authentication audit log model (append-only).

use cynode_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

pub const EVENT_LOGIN: &str = "login";
pub const EVENT_REFRESH: &str = "refresh";
pub const EVENT_LOGOUT: &str = "logout";

/// A row from the `auth_audit_log` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AuthAuditEntry {
    pub id: DbId,
    pub user_id: Option<DbId>,
    pub event_type: String,
    pub success: bool,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub details: Option<String>,
    pub created_at: Timestamp,
}

/// DTO for appending an audit entry.
#[derive(Debug, Clone)]
pub struct CreateAuthAuditEntry {
    pub user_id: Option<DbId>,
    pub event_type: &'static str,
    pub success: bool,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub details: Option<String>,
}
