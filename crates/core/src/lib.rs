//! Shared domain types for the cynode control plane, worker API and node agent.
//!
//! Nothing in this crate performs I/O. The wire payloads exchanged between the
//! three services live here so every side agrees on a single definition.

pub mod error;
pub mod hashing;
pub mod job_run;
pub mod node_protocol;
pub mod problem;
pub mod status;
pub mod types;

/// Every cross-service payload carries this version number.
pub const PROTOCOL_VERSION: u32 = 1;
