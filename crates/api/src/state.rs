use std::sync::Arc;

use cynode_db::Store;

use crate::config::ServerConfig;
use crate::middleware::rate_limit::LoginRateLimiter;

/// Shared application state available to all handlers via `State<AppState>`.
///
/// Cheaply cloneable; everything lives behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Persistence, as a set of narrow capability traits.
    pub store: Arc<dyn Store>,
    pub config: Arc<ServerConfig>,
    /// Per-IP token bucket guarding `POST /v1/auth/login`.
    pub login_limiter: Arc<LoginRateLimiter>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, config: ServerConfig) -> Self {
        let login_limiter = Arc::new(LoginRateLimiter::per_minute(
            config.login_rate_limit_per_minute,
        ));
        Self {
            store,
            config: Arc::new(config),
            login_limiter,
        }
    }
}
