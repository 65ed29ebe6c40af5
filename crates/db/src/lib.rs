//! Persistence layer for the control plane.
//!
//! - [`store`] -- narrow capability traits the rest of the system depends on.
//! - [`repositories`] -- PostgreSQL queries, one zero-sized repo per table.
//! - [`pg_store::PgStore`] -- adapts the repositories to the store traits.
//! - [`memory::MemoryStore`] -- mutex-guarded in-memory implementation.

pub mod error;
pub mod memory;
pub mod models;
pub mod pg_store;
pub mod repositories;
pub mod store;

use sqlx::postgres::PgPoolOptions;

pub use error::DbError;
pub use memory::MemoryStore;
pub use pg_store::PgStore;
pub use store::{AuditStore, JobStore, NodeStore, SessionStore, Store, TaskStore, UserStore};

pub type DbPool = sqlx::PgPool;

/// Create a connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .connect(database_url)
        .await
}

/// Run a trivial query to confirm the database is reachable.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Apply all pending migrations from `db/migrations`.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("../../db/migrations").run(pool).await
}
