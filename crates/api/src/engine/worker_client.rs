//! HTTP client for `POST /v1/worker/jobs:run`.

use std::time::Duration;

use cynode_core::job_run::{JobRunRequest, JobRunResponse};
use cynode_core::PROTOCOL_VERSION;
use reqwest::StatusCode;
use serde::Deserialize;

/// Worker-API path appended to a node's target URL.
pub const JOBS_RUN_PATH: &str = "/v1/worker/jobs:run";

/// Error bodies longer than this are cut before being recorded.
const MAX_ERROR_BODY_CHARS: usize = 512;

#[derive(Debug, thiserror::Error)]
pub enum WorkerClientError {
    #[error("worker request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("worker returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("undecodable worker response: {0}")]
    Decode(String),

    #[error("unsupported worker response version {0}")]
    Version(u32),
}

/// A decoded worker response together with the JSON body it came from.
#[derive(Debug, Clone)]
pub struct WorkerRun {
    pub response: JobRunResponse,
    /// The body exactly as the worker sent it, unknown fields included.
    pub raw: serde_json::Value,
}

/// Calls worker APIs with a fixed per-request timeout.
#[derive(Debug, Clone)]
pub struct WorkerClient {
    http: reqwest::Client,
}

impl WorkerClient {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http })
    }

    /// Run a job synchronously on the worker at `target_url`.
    ///
    /// Anything but a 200 carrying a version-1 response is an error.
    pub async fn run_job(
        &self,
        target_url: &str,
        bearer_token: &str,
        request: &JobRunRequest,
    ) -> Result<WorkerRun, WorkerClientError> {
        let url = format!("{}{JOBS_RUN_PATH}", target_url.trim_end_matches('/'));
        let response = self
            .http
            .post(&url)
            .bearer_auth(bearer_token)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            let body: String = response
                .text()
                .await
                .unwrap_or_default()
                .chars()
                .take(MAX_ERROR_BODY_CHARS)
                .collect();
            return Err(WorkerClientError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        let raw: serde_json::Value = serde_json::from_slice(&bytes)
            .map_err(|e| WorkerClientError::Decode(e.to_string()))?;
        let parsed = JobRunResponse::deserialize(&raw)
            .map_err(|e| WorkerClientError::Decode(e.to_string()))?;
        if parsed.version != PROTOCOL_VERSION {
            return Err(WorkerClientError::Version(parsed.version));
        }
        Ok(WorkerRun {
            response: parsed,
            raw,
        })
    }
}
