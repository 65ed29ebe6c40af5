//! Handlers for `/v1/auth` (login, refresh, logout).

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use cynode_core::error::CoreError;
use cynode_core::types::DbId;
use cynode_db::models::audit::{
    CreateAuthAuditEntry, EVENT_LOGIN, EVENT_LOGOUT, EVENT_REFRESH,
};
use cynode_db::models::session::CreateSession;
use cynode_db::models::user::User;
use cynode_db::DbError;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::auth::jwt::{hash_token, issue_token, validate_token, TokenKind};
use crate::auth::password::verify_password;
use crate::error::{AppError, AppResult};
use crate::extract::ApiJson;
use crate::middleware::auth::AuthUser;
use crate::middleware::client_ip::ClientInfo;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Request body for `POST /v1/auth/login`.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "handle is required"))]
    pub handle: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

/// Request body for `POST /v1/auth/refresh` and `POST /v1/auth/logout`.
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Token pair returned by login and refresh.
#[derive(Debug, Serialize)]
pub struct TokenPairResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
}

fn invalid_credentials() -> AppError {
    AppError::Core(CoreError::Unauthorized("Invalid handle or password".into()))
}

fn invalid_refresh_token() -> AppError {
    AppError::Core(CoreError::Unauthorized(
        "Invalid or expired refresh token".into(),
    ))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /v1/auth/login
///
/// Rate-limited per client IP before the store is consulted.
pub async fn login(
    State(state): State<AppState>,
    client: ClientInfo,
    ApiJson(input): ApiJson<LoginRequest>,
) -> AppResult<Json<TokenPairResponse>> {
    if !state.login_limiter.try_acquire(client.rate_limit_key()) {
        tracing::warn!(ip = client.rate_limit_key(), "Login rate limit exceeded");
        return Err(AppError::RateLimited);
    }
    input.validate()?;

    let Some(user) = state.store.find_user_by_handle(&input.handle).await? else {
        audit(&state, &client, None, EVENT_LOGIN, false, Some("unknown handle")).await;
        return Err(invalid_credentials());
    };

    let valid = match state.store.find_password_credential(user.id).await? {
        Some(credential) => verify_password(&input.password, &credential.password_hash)
            .map_err(|e| AppError::InternalError(format!("Password verification error: {e}")))?,
        None => false,
    };
    if !valid {
        audit(&state, &client, Some(user.id), EVENT_LOGIN, false, Some("bad password")).await;
        return Err(invalid_credentials());
    }

    if !user.is_active {
        audit(&state, &client, Some(user.id), EVENT_LOGIN, false, Some("inactive account")).await;
        return Err(AppError::Core(CoreError::Forbidden(
            "Account is deactivated".into(),
        )));
    }

    let response = issue_token_pair(&state, &user, None).await?;
    audit(&state, &client, Some(user.id), EVENT_LOGIN, true, None).await;
    tracing::info!(user_id = %user.id, handle = %user.handle, "User logged in");

    Ok(Json(response))
}

/// POST /v1/auth/refresh
///
/// Exchange a refresh token for a new pair. The presented token is
/// single-use: its session is deactivated in the same transaction that
/// creates the new one.
pub async fn refresh(
    State(state): State<AppState>,
    client: ClientInfo,
    ApiJson(input): ApiJson<RefreshRequest>,
) -> AppResult<Json<TokenPairResponse>> {
    let claims = match validate_token(&input.refresh_token, TokenKind::UserRefresh, &state.config.jwt) {
        Ok(claims) => claims,
        Err(e) => {
            tracing::debug!(error = %e, "Refresh token rejected");
            audit(&state, &client, None, EVENT_REFRESH, false, Some("invalid token")).await;
            return Err(invalid_refresh_token());
        }
    };

    let token_hash = hash_token(&input.refresh_token);
    let session = match state.store.find_active_session_by_hash(&token_hash).await? {
        Some(session) if session.user_id == claims.sub => session,
        _ => {
            audit(&state, &client, Some(claims.sub), EVENT_REFRESH, false, Some("no usable session")).await;
            return Err(invalid_refresh_token());
        }
    };

    let user = state
        .store
        .find_user_by_id(session.user_id)
        .await?
        .ok_or_else(invalid_refresh_token)?;
    if !user.is_active {
        return Err(AppError::Core(CoreError::Forbidden(
            "Account is deactivated".into(),
        )));
    }

    let response = issue_token_pair(&state, &user, Some(session.id)).await?;
    audit(&state, &client, Some(user.id), EVENT_REFRESH, true, None).await;

    Ok(Json(response))
}

/// POST /v1/auth/logout
///
/// Deactivate the session behind the presented refresh token. Always 204;
/// an unknown or foreign token is simply ignored.
pub async fn logout(
    State(state): State<AppState>,
    auth_user: AuthUser,
    client: ClientInfo,
    ApiJson(input): ApiJson<RefreshRequest>,
) -> AppResult<StatusCode> {
    let token_hash = hash_token(&input.refresh_token);
    let invalidated = match state.store.find_active_session_by_hash(&token_hash).await? {
        Some(session) if session.user_id == auth_user.user_id => {
            state.store.invalidate_session(session.id).await?
        }
        _ => false,
    };

    audit(&state, &client, Some(auth_user.user_id), EVENT_LOGOUT, true, None).await;
    tracing::info!(user_id = %auth_user.user_id, invalidated, "User logged out");

    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Sign an access/refresh pair and persist the refresh session.
///
/// With `rotate_from` the old session is swapped for the new one atomically;
/// losing that race surfaces as 401.
async fn issue_token_pair(
    state: &AppState,
    user: &User,
    rotate_from: Option<DbId>,
) -> AppResult<TokenPairResponse> {
    let jwt = &state.config.jwt;
    let access = issue_token(TokenKind::UserAccess, user.id, &user.handle, jwt)
        .map_err(|e| AppError::InternalError(format!("Token generation error: {e}")))?;
    let refresh = issue_token(TokenKind::UserRefresh, user.id, &user.handle, jwt)
        .map_err(|e| AppError::InternalError(format!("Token generation error: {e}")))?;

    let session = CreateSession {
        user_id: user.id,
        refresh_token_hash: hash_token(&refresh.token),
        expires_at: refresh.expires_at,
    };

    match rotate_from {
        Some(old_id) => {
            state
                .store
                .rotate_session(old_id, &session)
                .await
                .map_err(|e| match e {
                    DbError::NotFound => invalid_refresh_token(),
                    other => other.into(),
                })?;
        }
        None => {
            state.store.create_session(&session).await?;
        }
    }

    Ok(TokenPairResponse {
        access_token: access.token,
        refresh_token: refresh.token,
        token_type: "Bearer",
        expires_in: jwt.lifetime(TokenKind::UserAccess).num_seconds(),
    })
}

/// Append an audit entry. Failures are logged and never fail the request.
async fn audit(
    state: &AppState,
    client: &ClientInfo,
    user_id: Option<DbId>,
    event_type: &'static str,
    success: bool,
    details: Option<&str>,
) {
    let entry = CreateAuthAuditEntry {
        user_id,
        event_type,
        success,
        ip_address: client.ip.clone(),
        user_agent: client.user_agent.clone(),
        details: details.map(str::to_string),
    };
    if let Err(e) = state.store.record_auth_event(&entry).await {
        tracing::error!(error = %e, event_type, "Failed to write auth audit entry");
    }
}
