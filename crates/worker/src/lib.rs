//! Worker node API.
//!
//! - [`server`] -- bearer-guarded `POST /v1/worker/jobs:run`.
//! - [`executor`] -- per-job subprocess supervisor (container or direct).
//! - [`proxy`] -- localhost reverse proxy in front of the inference backend.
//!
//! The node manager embeds these in-process; the `cynode-worker` binary runs
//! the worker API on its own.

pub mod config;
pub mod error;
pub mod executor;
pub mod proxy;
pub mod server;
