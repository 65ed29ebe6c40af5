use axum::extract::rejection::JsonRejection;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use cynode_core::error::CoreError;
use cynode_core::problem::{Problem, ProblemKind, PROBLEM_CONTENT_TYPE};

use crate::executor::ExecutorError;

/// Errors returned by the worker HTTP surface as RFC 9457 problems.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Executor(#[from] ExecutorError),

    #[error("Request body too large")]
    PayloadTooLarge,
}

impl From<JsonRejection> for WorkerError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            WorkerError::PayloadTooLarge
        } else {
            WorkerError::Core(CoreError::Validation(rejection.body_text()))
        }
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

impl IntoResponse for WorkerError {
    fn into_response(self) -> Response {
        let (kind, detail) = match &self {
            WorkerError::Core(core) => match core {
                CoreError::Validation(msg) => (ProblemKind::Validation, Some(msg.clone())),
                CoreError::Unauthorized(_) => (ProblemKind::Authentication, None),
                CoreError::Forbidden(_) => (ProblemKind::Authorization, None),
                CoreError::NotFound { .. } => (ProblemKind::NotFound, None),
                CoreError::Conflict(msg) => (ProblemKind::Conflict, Some(msg.clone())),
                CoreError::Internal(msg) => {
                    tracing::error!(error = %msg, "Internal worker error");
                    (ProblemKind::Internal, None)
                }
            },
            WorkerError::Executor(err) => {
                tracing::error!(error = %err, "Executor failure");
                (ProblemKind::Internal, None)
            }
            WorkerError::PayloadTooLarge => (ProblemKind::PayloadTooLarge, None),
        };
        problem_response(kind, detail)
    }
}
