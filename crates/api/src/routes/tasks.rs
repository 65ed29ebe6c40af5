//! Route definitions for `/v1/tasks`.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::tasks;
use crate::state::AppState;

/// Routes mounted at `/tasks`. All require user auth.
///
/// ```text
/// POST /               -> create_task
/// GET  /{id}           -> get_task
/// GET  /{id}/result    -> get_task_result
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(tasks::create_task))
        .route("/{id}", get(tasks::get_task))
        .route("/{id}/result", get(tasks::get_task_result))
}
