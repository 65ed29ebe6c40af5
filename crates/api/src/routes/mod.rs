pub mod auth;
pub mod health;
pub mod nodes;
pub mod tasks;
pub mod users;

use axum::Router;

use crate::state::AppState;

/// Build the `/v1` route tree.
///
/// ```text
/// /auth/login                  login (public, rate-limited)
/// /auth/refresh                refresh (refresh token in body)
/// /auth/logout                 logout (requires user auth)
///
/// /users/me                    current user
///
/// /tasks                       create (POST)
/// /tasks/{id}                  get
/// /tasks/{id}/result           task status + job results
///
/// /nodes/register              registration (PSK in body)
/// /nodes/config                fetch (GET) / acknowledge (POST), node auth
/// /nodes/capability            capability report, node auth
/// ```
pub fn v1_routes() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/users", users::router())
        .nest("/tasks", tasks::router())
        .nest("/nodes", nodes::router())
}
