use axum::routing::get;
use axum::Router;

use crate::handlers::health;
use crate::state::AppState;

/// `GET /healthz`, mounted at the root.
pub fn router() -> Router<AppState> {
    Router::new().route("/healthz", get(health::health_check))
}
