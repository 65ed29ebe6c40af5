//! Route definitions for `/v1/nodes`.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::nodes;
use crate::state::AppState;

/// Routes mounted at `/nodes`.
///
/// ```text
/// POST /register    -> register (PSK)
/// GET  /config      -> get_config (node auth)
/// POST /config      -> ack_config (node auth)
/// POST /capability  -> report_capability (node auth)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(nodes::register))
        .route("/config", get(nodes::get_config).post(nodes::ack_config))
        .route("/capability", post(nodes::report_capability))
}
