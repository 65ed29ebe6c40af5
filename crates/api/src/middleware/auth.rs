//! Bearer-credential extractors for user and node routes.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use cynode_core::error::CoreError;
use cynode_core::types::DbId;

use crate::auth::jwt::{validate_token, Claims, TokenKind};
use crate::error::AppError;
use crate::state::AppState;

/// Extract the token from `Authorization: Bearer <token>`.
///
/// The scheme is matched case-insensitively.
pub fn bearer_token(parts: &Parts) -> Result<&str, AppError> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            AppError::Core(CoreError::Unauthorized(
                "Missing Authorization header".into(),
            ))
        })?;

    match header.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() => {
            Ok(token.trim())
        }
        _ => Err(AppError::Core(CoreError::Unauthorized(
            "Invalid Authorization format. Expected: Bearer <token>".into(),
        ))),
    }
}

fn claims_of_kind(parts: &Parts, state: &AppState, kind: TokenKind) -> Result<Claims, AppError> {
    let token = bearer_token(parts)?;
    validate_token(token, kind, &state.config.jwt)
        .map_err(|_| AppError::Core(CoreError::Unauthorized("Invalid or expired token".into())))
}

/// Authenticated user, from a `user_access` credential.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: DbId,
    pub handle: String,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let claims = claims_of_kind(parts, state, TokenKind::UserAccess)?;
        Ok(AuthUser {
            user_id: claims.sub,
            handle: claims.name,
        })
    }
}

/// Authenticated node, from a `node` credential.
#[derive(Debug, Clone)]
pub struct AuthNode {
    pub node_id: DbId,
    pub node_slug: String,
}

impl FromRequestParts<AppState> for AuthNode {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let claims = claims_of_kind(parts, state, TokenKind::Node)?;
        Ok(AuthNode {
            node_id: claims.sub,
            node_slug: claims.name,
        })
    }
}
