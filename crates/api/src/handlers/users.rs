//! Handlers for `/v1/users`.

use axum::extract::State;
use axum::Json;
use cynode_core::error::CoreError;
use cynode_core::types::DbId;
use serde::Serialize;

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::state::AppState;

/// Public view of the calling user.
#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub id: DbId,
    pub handle: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub is_active: bool,
}

/// GET /v1/users/me
pub async fn me(State(state): State<AppState>, auth_user: AuthUser) -> AppResult<Json<MeResponse>> {
    let user = state
        .store
        .find_user_by_id(auth_user.user_id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "User",
            id: auth_user.user_id,
        })?;

    Ok(Json(MeResponse {
        id: user.id,
        handle: user.handle,
        email: user.email,
        is_active: user.is_active,
    }))
}
