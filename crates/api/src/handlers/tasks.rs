//! Handlers for `/v1/tasks`.

use std::collections::BTreeMap;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use cynode_core::error::CoreError;
use cynode_core::job_run::SandboxSpec;
use cynode_core::status::{JobStatus, TaskStatus};
use cynode_core::types::{DbId, Timestamp};
use cynode_db::models::task::{CreateTask, Task};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::config::ServerConfig;
use crate::error::{AppError, AppResult};
use crate::extract::ApiJson;
use crate::middleware::auth::AuthUser;
use crate::state::AppState;

/// In-sandbox address of the node's inference proxy.
const IN_SANDBOX_INFERENCE_URL: &str = "http://localhost:11434";

/// Sends `CYNODE_PROMPT` to the inference backend and prints the reply.
const PROMPT_SCRIPT: &str = r#"import json, os, urllib.request
body = json.dumps({
    "model": os.environ["INFERENCE_MODEL"],
    "prompt": os.environ["CYNODE_PROMPT"],
    "stream": False,
}).encode()
req = urllib.request.Request(
    os.environ["OLLAMA_BASE_URL"] + "/api/generate",
    data=body,
    headers={"Content-Type": "application/json"},
)
with urllib.request.urlopen(req, timeout=300) as resp:
    print(json.load(resp).get("response", ""))
"#;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// How the prompt is turned into a command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputMode {
    /// Natural language, answered by the node's inference backend.
    #[default]
    Prompt,
    /// Literal shell command.
    Script,
}

/// Request body for `POST /v1/tasks`.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateTaskRequest {
    #[validate(custom(function = "not_blank"))]
    pub prompt: String,
    #[serde(default)]
    pub input_mode: InputMode,
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("required");
        err.message = Some("prompt is required".into());
        return Err(err);
    }
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct TaskResponse {
    pub id: DbId,
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl From<Task> for TaskResponse {
    fn from(task: Task) -> Self {
        Self {
            id: task.id,
            status: task.status,
            prompt: task.prompt,
            summary: task.summary,
            created_at: task.created_at,
            updated_at: task.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct JobResultResponse {
    pub id: DbId,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<Timestamp>,
}

#[derive(Debug, Serialize)]
pub struct TaskResultResponse {
    pub task_id: DbId,
    pub status: TaskStatus,
    pub jobs: Vec<JobResultResponse>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /v1/tasks
///
/// Creates the task and its single queued job atomically.
pub async fn create_task(
    State(state): State<AppState>,
    auth_user: AuthUser,
    ApiJson(input): ApiJson<CreateTaskRequest>,
) -> AppResult<(StatusCode, Json<TaskResponse>)> {
    input.validate()?;

    let sandbox = sandbox_for(&input, &state.config);
    let job_payload = serde_json::to_string(&sandbox)
        .map_err(|e| AppError::InternalError(format!("Failed to encode job payload: {e}")))?;

    let (task, job) = state
        .store
        .create_task_with_job(&CreateTask {
            created_by: Some(auth_user.user_id),
            prompt: input.prompt,
            job_payload,
        })
        .await?;

    tracing::info!(
        task_id = %task.id,
        job_id = %job.id,
        user_id = %auth_user.user_id,
        input_mode = ?input.input_mode,
        "Task created"
    );
    Ok((StatusCode::CREATED, Json(task.into())))
}

/// GET /v1/tasks/{id}
pub async fn get_task(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<Json<TaskResponse>> {
    let task = find_owned_task(&state, &auth_user, id).await?;
    Ok(Json(task.into()))
}

/// GET /v1/tasks/{id}/result
pub async fn get_task_result(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<Json<TaskResultResponse>> {
    let task = find_owned_task(&state, &auth_user, id).await?;
    let jobs = state
        .store
        .list_jobs_for_task(task.id)
        .await?
        .into_iter()
        .map(|job| JobResultResponse {
            id: job.id,
            status: job.status,
            result: job.result,
            started_at: job.started_at,
            ended_at: job.ended_at,
        })
        .collect();

    Ok(Json(TaskResultResponse {
        task_id: task.id,
        status: task.status,
        jobs,
    }))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn find_owned_task(state: &AppState, auth_user: &AuthUser, id: DbId) -> AppResult<Task> {
    let task = state
        .store
        .find_task(id)
        .await?
        .ok_or(CoreError::NotFound { entity: "Task", id })?;

    if task.created_by != Some(auth_user.user_id) {
        return Err(AppError::Core(CoreError::Forbidden(
            "Task belongs to another user".into(),
        )));
    }
    Ok(task)
}

/// Build the job payload for a new task.
fn sandbox_for(input: &CreateTaskRequest, config: &ServerConfig) -> SandboxSpec {
    match input.input_mode {
        InputMode::Script => SandboxSpec {
            command: vec!["sh".into(), "-c".into(), input.prompt.clone()],
            ..SandboxSpec::default()
        },
        InputMode::Prompt => {
            let env = BTreeMap::from([
                ("CYNODE_PROMPT".to_string(), input.prompt.clone()),
                ("INFERENCE_MODEL".to_string(), config.inference_model.clone()),
                (
                    "OLLAMA_BASE_URL".to_string(),
                    IN_SANDBOX_INFERENCE_URL.to_string(),
                ),
            ]);
            SandboxSpec {
                image: Some(config.prompt_mode_image.clone()),
                command: vec!["python3".into(), "-c".into(), PROMPT_SCRIPT.into()],
                env,
                use_inference: true,
                ..SandboxSpec::default()
            }
        }
    }
}
