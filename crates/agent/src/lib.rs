//! `cynode-agent` library crate.
//!
//! The node manager: registers with the control plane, pulls and
//! acknowledges configuration, runs the local worker API and inference
//! proxy, and reports capabilities on an interval. The binary entrypoint
//! lives in `main.rs`.

pub mod client;
pub mod collector;
pub mod config;
pub mod error;
pub mod manager;
pub mod services;
