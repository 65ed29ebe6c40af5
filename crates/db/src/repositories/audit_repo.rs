//! Repository for the append-only `auth_audit_log` table.

use cynode_core::types::DbId;
use sqlx::PgPool;

use crate::models::audit::CreateAuthAuditEntry;

pub struct AuditRepo;

impl AuditRepo {
    pub async fn insert(pool: &PgPool, entry: &CreateAuthAuditEntry) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO auth_audit_log
                (id, user_id, event_type, success, ip_address, user_agent, details)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(DbId::new_v4())
        .bind(entry.user_id)
        .bind(entry.event_type)
        .bind(entry.success)
        .bind(&entry.ip_address)
        .bind(&entry.user_agent)
        .bind(&entry.details)
        .execute(pool)
        .await?;
        Ok(())
    }
}
