//! PostgreSQL repositories, one zero-sized struct per table.
//!
//! Repositories take a `&PgPool` (or an open transaction) and return
//! `sqlx::Error`; [`PgStore`](crate::PgStore) maps those into
//! [`DbError`](crate::DbError).

pub mod audit_repo;
pub mod job_repo;
pub mod node_repo;
pub mod session_repo;
pub mod task_repo;
pub mod user_repo;

pub use audit_repo::AuditRepo;
pub use job_repo::JobRepo;
pub use node_repo::NodeRepo;
pub use session_repo::SessionRepo;
pub use task_repo::TaskRepo;
pub use user_repo::UserRepo;
