//! HS256 credential issuing and validation.
//!
//! Three credential kinds share one claim layout and one secret. The kind is
//! part of the signed payload, so a valid token of the wrong kind is rejected
//! just like a forged one. Refresh tokens are JWTs as well; only their
//! SHA-256 hash is stored server-side.

use chrono::{Duration, Utc};
use cynode_core::hashing::sha256_hex;
use cynode_core::types::{DbId, Timestamp};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::{env_parse, env_required, ConfigError};

/// What a credential authorises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    UserAccess,
    UserRefresh,
    Node,
}

/// Claims embedded in every credential.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject: user id or node id.
    pub sub: DbId,
    /// Subject name: user handle or node slug.
    pub name: String,
    pub kind: TokenKind,
    /// Issued-at time (UTC Unix timestamp).
    pub iat: i64,
    /// Expiration time (UTC Unix timestamp).
    pub exp: i64,
    /// Unique token identifier.
    pub jti: String,
}

/// Configuration for credential issuing and validation.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// HMAC-SHA256 secret used to sign and verify tokens.
    pub secret: String,
    pub access_token_expiry_mins: i64,
    pub refresh_token_expiry_days: i64,
    pub node_token_expiry_hours: i64,
}

impl JwtConfig {
    /// Load JWT configuration from environment variables.
    ///
    /// | Env Var                    | Required | Default |
    /// |----------------------------|----------|---------|
    /// | `JWT_SECRET`               | **yes**  | --      |
    /// | `JWT_ACCESS_EXPIRY_MINS`   | no       | `15`    |
    /// | `JWT_REFRESH_EXPIRY_DAYS`  | no       | `7`     |
    /// | `JWT_NODE_EXPIRY_HOURS`    | no       | `24`    |
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            secret: env_required("JWT_SECRET")?,
            access_token_expiry_mins: env_parse("JWT_ACCESS_EXPIRY_MINS", 15)?,
            refresh_token_expiry_days: env_parse("JWT_REFRESH_EXPIRY_DAYS", 7)?,
            node_token_expiry_hours: env_parse("JWT_NODE_EXPIRY_HOURS", 24)?,
        })
    }

    /// Lifetime of a credential of the given kind.
    pub fn lifetime(&self, kind: TokenKind) -> Duration {
        match kind {
            TokenKind::UserAccess => Duration::minutes(self.access_token_expiry_mins),
            TokenKind::UserRefresh => Duration::days(self.refresh_token_expiry_days),
            TokenKind::Node => Duration::hours(self.node_token_expiry_hours),
        }
    }
}

/// A freshly signed credential.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: Timestamp,
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("Invalid token: {0}")]
    Invalid(#[from] jsonwebtoken::errors::Error),

    #[error("Expected a {expected:?} token, got {actual:?}")]
    WrongKind {
        expected: TokenKind,
        actual: TokenKind,
    },
}

/// Sign a credential of `kind` for `sub`.
pub fn issue_token(
    kind: TokenKind,
    sub: DbId,
    name: &str,
    config: &JwtConfig,
) -> Result<IssuedToken, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let expires_at = now + config.lifetime(kind);

    let claims = Claims {
        sub,
        name: name.to_string(),
        kind,
        iat: now.timestamp(),
        exp: expires_at.timestamp(),
        jti: Uuid::new_v4().to_string(),
    };

    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )?;
    Ok(IssuedToken { token, expires_at })
}

/// Verify signature, algorithm, and expiry, then check the credential kind.
pub fn validate_token(
    token: &str,
    expected: TokenKind,
    config: &JwtConfig,
) -> Result<Claims, TokenError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )?;
    let claims = token_data.claims;
    if claims.kind != expected {
        return Err(TokenError::WrongKind {
            expected,
            actual: claims.kind,
        });
    }
    Ok(claims)
}

/// SHA-256 hex digest of a token, the only form persisted.
pub fn hash_token(token: &str) -> String {
    sha256_hex(token.as_bytes())
}
