//! Job dispatch.
//!
//! - [`dispatcher::JobDispatcher`] -- single-writer loop that claims queued
//!   jobs and runs them on dispatchable nodes.
//! - [`worker_client::WorkerClient`] -- HTTP client for a node's worker API.

pub mod dispatcher;
pub mod worker_client;
