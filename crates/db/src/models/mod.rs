//! Domain model structs and DTOs.
//!
//! Each submodule contains a `FromRow` entity struct matching the database
//! row plus the insert/update DTOs the store traits accept.

pub mod audit;
pub mod job;
pub mod node;
pub mod session;
pub mod task;
pub mod user;
