//! Request extractors and guards.
//!
//! - [`auth::AuthUser`] -- user access credential from a Bearer token.
//! - [`auth::AuthNode`] -- node credential from a Bearer token.
//! - [`client_ip::ClientInfo`] -- caller IP and user agent.
//! - [`rate_limit::LoginRateLimiter`] -- per-IP token bucket for login.

pub mod auth;
pub mod client_ip;
pub mod rate_limit;
