use axum::extract::State;

use crate::state::AppState;

/// GET /healthz
///
/// Always answers `ok`; a failing store ping is logged as degradation.
pub async fn health_check(State(state): State<AppState>) -> &'static str {
    if let Err(e) = state.store.ping().await {
        tracing::warn!(error = %e, "Health check: store unreachable");
    }
    "ok"
}
