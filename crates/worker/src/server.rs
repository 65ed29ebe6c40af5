//! Worker API router.

use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, FromRequestParts, State};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use cynode_core::error::CoreError;
use cynode_core::hashing::constant_time_eq;
use cynode_core::job_run::{JobRunRequest, JobRunResponse};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::error::WorkerError;
use crate::executor::SandboxExecutor;

/// Maximum accepted job-run request body.
pub const MAX_JOB_REQUEST_BYTES: usize = 10 * 1024 * 1024;

/// Shared state of the worker API.
#[derive(Clone)]
pub struct WorkerState {
    pub executor: Arc<SandboxExecutor>,
    /// Static bearer token the control plane presents.
    pub bearer_token: Arc<str>,
}

impl WorkerState {
    pub fn new(executor: SandboxExecutor, bearer_token: impl Into<Arc<str>>) -> Self {
        Self {
            executor: Arc::new(executor),
            bearer_token: bearer_token.into(),
        }
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header.
///
/// The scheme is matched case-insensitively.
pub fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Proof that the request carried the configured bearer token.
pub struct OrchestratorAuth;

impl FromRequestParts<WorkerState> for OrchestratorAuth {
    type Rejection = WorkerError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &WorkerState,
    ) -> Result<Self, Self::Rejection> {
        match bearer_token(parts) {
            Some(token) if constant_time_eq(token.as_bytes(), state.bearer_token.as_bytes()) => {
                Ok(OrchestratorAuth)
            }
            _ => Err(CoreError::Unauthorized("invalid or missing bearer token".into()).into()),
        }
    }
}

async fn healthz() -> &'static str {
    "ok"
}

/// POST /v1/worker/jobs:run
///
/// Runs the job synchronously. Job failures and timeouts are a 200 with the
/// outcome in the body.
async fn run_job(
    _auth: OrchestratorAuth,
    State(state): State<WorkerState>,
    body: Result<Json<JobRunRequest>, axum::extract::rejection::JsonRejection>,
) -> Result<impl IntoResponse, WorkerError> {
    let Json(request) = body?;
    request.validate()?;

    let response: JobRunResponse = state.executor.run(&request).await?;
    Ok((StatusCode::OK, Json(response)))
}

/// Build the worker API router.
pub fn router(state: WorkerState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/v1/worker/jobs:run", post(run_job))
        .layer(DefaultBodyLimit::max(MAX_JOB_REQUEST_BYTES))
        .layer(CatchPanicLayer::new())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}
