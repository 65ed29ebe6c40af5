use axum::extract::rejection::JsonRejection;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use cynode_core::error::CoreError;
use cynode_core::problem::{Problem, ProblemKind, PROBLEM_CONTENT_TYPE};
use cynode_db::DbError;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and [`DbError`] for store failures,
/// and renders every variant as an RFC 9457 problem document.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `cynode_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A store failure.
    #[error(transparent)]
    Database(#[from] DbError),

    /// A request that could not be decoded.
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Request body too large")]
    PayloadTooLarge,

    #[error("Too many requests")]
    RateLimited,

    /// An internal error with a message that is logged, never returned.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::PayloadTooLarge
        } else {
            AppError::BadRequest(rejection.body_text())
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Core(CoreError::Validation(errors.to_string()))
    }
}

/// Render a problem document with the matching status and content type.
pub fn problem_response(kind: ProblemKind, detail: Option<String>) -> Response {
    let problem = Problem::new(kind, detail);
    let status = StatusCode::from_u16(problem.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        [(header::CONTENT_TYPE, PROBLEM_CONTENT_TYPE)],
        axum::Json(problem),
    )
        .into_response()
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (kind, detail) = match &self {
            // --- CoreError variants ---
            AppError::Core(core) => match core {
                CoreError::NotFound { entity, id } => (
                    ProblemKind::NotFound,
                    Some(format!("{entity} with id {id} not found")),
                ),
                CoreError::Validation(msg) => (ProblemKind::Validation, Some(msg.clone())),
                CoreError::Conflict(msg) => (ProblemKind::Conflict, Some(msg.clone())),
                CoreError::Unauthorized(msg) => (ProblemKind::Authentication, Some(msg.clone())),
                CoreError::Forbidden(msg) => (ProblemKind::Authorization, Some(msg.clone())),
                CoreError::Internal(msg) => {
                    tracing::error!(error = %msg, "Internal core error");
                    (ProblemKind::Internal, None)
                }
            },

            // --- Store errors ---
            AppError::Database(err) => classify_db_error(err),

            // --- HTTP-specific errors ---
            AppError::BadRequest(msg) => (ProblemKind::Validation, Some(msg.clone())),
            AppError::PayloadTooLarge => (ProblemKind::PayloadTooLarge, None),
            AppError::RateLimited => (
                ProblemKind::RateLimit,
                Some("Too many login attempts, try again later".into()),
            ),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (ProblemKind::Internal, None)
            }
        };

        problem_response(kind, detail)
    }
}

/// Map a store error onto a problem kind.
///
/// - `NotFound` maps to 404.
/// - Unique constraint violations map to 409.
/// - Everything else maps to 500 with the detail logged, not returned.
fn classify_db_error(err: &DbError) -> (ProblemKind, Option<String>) {
    match err {
        DbError::NotFound => (ProblemKind::NotFound, Some("Resource not found".into())),
        DbError::Conflict(constraint) => (
            ProblemKind::Conflict,
            Some(format!("Duplicate value violates unique constraint: {constraint}")),
        ),
        DbError::Sqlx(e) => {
            tracing::error!(error = %e, "Database error");
            (ProblemKind::Internal, None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cynode_core::types::DbId;

    #[test]
    fn status_mapping_follows_problem_kinds() {
        let cases: Vec<(AppError, StatusCode)> = vec![
            (CoreError::Validation("x".into()).into(), StatusCode::BAD_REQUEST),
            (CoreError::Unauthorized("x".into()).into(), StatusCode::UNAUTHORIZED),
            (CoreError::Forbidden("x".into()).into(), StatusCode::FORBIDDEN),
            (
                CoreError::NotFound {
                    entity: "Task",
                    id: DbId::nil(),
                }
                .into(),
                StatusCode::NOT_FOUND,
            ),
            (DbError::NotFound.into(), StatusCode::NOT_FOUND),
            (DbError::Conflict("uq_nodes_slug".into()).into(), StatusCode::CONFLICT),
            (AppError::RateLimited, StatusCode::TOO_MANY_REQUESTS),
            (AppError::BadRequest("x".into()), StatusCode::BAD_REQUEST),
            (AppError::InternalError("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, expected) in cases {
            let response = err.into_response();
            assert_eq!(response.status(), expected);
            assert_eq!(
                response.headers()[header::CONTENT_TYPE],
                PROBLEM_CONTENT_TYPE
            );
        }
    }
}
