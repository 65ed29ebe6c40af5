//! CyNode control plane library.
//!
//! Exposes the building blocks (config, state, error handling, routes,
//! dispatcher) so integration tests and the binary entrypoint share them.

pub mod auth;
pub mod background;
pub mod bootstrap;
pub mod config;
pub mod engine;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod routes;
pub mod state;
