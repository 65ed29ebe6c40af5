//! Sandbox spec and the job-run request/response exchanged between the
//! dispatcher and a node's worker API.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::status::JobStatus;
use crate::types::Timestamp;

/// Maximum characters kept when deriving a task summary from job output.
pub const SUMMARY_MAX_CHARS: usize = 200;

/// Runtime description of one execution. Also the job payload schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SandboxSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub command: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_policy: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub use_inference: bool,
}

impl SandboxSpec {
    /// Decode a stored job payload, rejecting an empty command vector.
    pub fn from_payload(payload: &str) -> Result<Self, CoreError> {
        let spec: SandboxSpec = serde_json::from_str(payload)
            .map_err(|e| CoreError::Validation(format!("invalid job payload: {e}")))?;
        spec.validate()?;
        Ok(spec)
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.command.is_empty() {
            return Err(CoreError::Validation("sandbox.command is required".into()));
        }
        Ok(())
    }
}

/// Body of `POST /v1/worker/jobs:run`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRunRequest {
    pub version: u32,
    pub task_id: String,
    pub job_id: String,
    pub sandbox: SandboxSpec,
}

impl JobRunRequest {
    pub fn validate(&self) -> Result<(), CoreError> {
        CoreError::check_version(self.version)?;
        self.sandbox.validate()
    }
}

/// Normalised terminal outcome reported by the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobRunStatus {
    Completed,
    Failed,
    Timeout,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Truncated {
    pub stdout: bool,
    pub stderr: bool,
}

/// Response of `POST /v1/worker/jobs:run`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRunResponse {
    pub version: u32,
    pub task_id: String,
    pub job_id: String,
    pub status: JobRunStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub started_at: Timestamp,
    pub ended_at: Timestamp,
    pub truncated: Truncated,
}

impl JobRunResponse {
    /// Job status recorded by the control plane for this outcome.
    pub fn job_status(&self) -> JobStatus {
        match self.status {
            JobRunStatus::Completed => JobStatus::Completed,
            JobRunStatus::Failed | JobRunStatus::Timeout => JobStatus::Failed,
        }
    }

    /// Short human-readable summary: first non-empty stdout line, else the
    /// first non-empty stderr line, else `"completed"`.
    pub fn summary(&self) -> String {
        first_line(&self.stdout)
            .or_else(|| first_line(&self.stderr))
            .unwrap_or_else(|| "completed".to_string())
    }
}

fn first_line(text: &str) -> Option<String> {
    text.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(|line| line.chars().take(SUMMARY_MAX_CHARS).collect())
}
