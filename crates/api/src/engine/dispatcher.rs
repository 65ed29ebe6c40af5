//! Background job dispatcher.
//!
//! Every tick claims the oldest queued job, picks the first dispatchable
//! node, and runs the job synchronously through the node's worker API. The
//! loop is the only writer of running and terminal job state.

use std::sync::Arc;
use std::time::Duration;

use cynode_core::job_run::{JobRunRequest, SandboxSpec};
use cynode_core::status::JobStatus;
use cynode_core::types::DbId;
use cynode_core::PROTOCOL_VERSION;
use cynode_db::models::job::{CompleteJob, Job};
use cynode_db::models::node::Node;
use cynode_db::{DbError, Store};
use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::engine::worker_client::WorkerClient;

/// What one dispatch cycle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// No queued job.
    Idle,
    /// The job was claimed elsewhere between read and claim.
    Skipped { job_id: DbId },
    /// The job reached a terminal state.
    Finished { job_id: DbId, status: JobStatus },
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("no dispatchable node for job {job_id}")]
    NoDispatchableNodes { job_id: DbId },

    #[error(transparent)]
    Store(#[from] DbError),
}

/// Single-writer background dispatcher.
pub struct JobDispatcher {
    store: Arc<dyn Store>,
    client: WorkerClient,
    tick: Duration,
}

impl JobDispatcher {
    pub fn new(store: Arc<dyn Store>, client: WorkerClient, tick: Duration) -> Self {
        Self {
            store,
            client,
            tick,
        }
    }

    /// Run the dispatcher loop until the cancellation token is triggered.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.tick);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tracing::info!(tick_ms = self.tick.as_millis() as u64, "Job dispatcher started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Job dispatcher shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    match self.dispatch_once().await {
                        Ok(DispatchOutcome::Finished { job_id, status }) => {
                            tracing::info!(job_id = %job_id, status = %status, "Job finished");
                        }
                        Ok(_) => {}
                        Err(e @ DispatchError::NoDispatchableNodes { .. }) => {
                            tracing::warn!(error = %e, "Dispatch deferred");
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "Dispatch cycle failed");
                        }
                    }
                }
            }
        }
    }

    /// One dispatch cycle.
    ///
    /// Only store failures and the absence of a dispatchable node are
    /// errors; every job-level failure is recorded on the job instead.
    pub async fn dispatch_once(&self) -> Result<DispatchOutcome, DispatchError> {
        let Some(job) = self.store.oldest_queued_job().await? else {
            return Ok(DispatchOutcome::Idle);
        };

        let node = self
            .store
            .list_dispatchable_nodes()
            .await?
            .into_iter()
            .next()
            .ok_or(DispatchError::NoDispatchableNodes { job_id: job.id })?;

        if !self.store.mark_job_running(job.id, node.id).await? {
            return Ok(DispatchOutcome::Skipped { job_id: job.id });
        }
        tracing::info!(job_id = %job.id, node_slug = %node.node_slug, "Job claimed");

        let status = self.execute(&job, &node).await?;
        Ok(DispatchOutcome::Finished {
            job_id: job.id,
            status,
        })
    }

    /// Run a claimed job and record its terminal state.
    async fn execute(&self, job: &Job, node: &Node) -> Result<JobStatus, DbError> {
        let spec = match job.payload.as_deref() {
            Some(payload) => SandboxSpec::from_payload(payload).map_err(|e| e.to_string()),
            None => Err("job has no payload".to_string()),
        };
        let sandbox = match spec {
            Ok(sandbox) => sandbox,
            Err(message) => {
                tracing::warn!(job_id = %job.id, error = %message, "Unparseable job payload");
                return self.fail(job.id, message).await;
            }
        };

        let request = JobRunRequest {
            version: PROTOCOL_VERSION,
            task_id: job.task_id.to_string(),
            job_id: job.id.to_string(),
            sandbox,
        };
        let target_url = node.worker_api_target_url.as_deref().unwrap_or_default();
        let bearer_token = node.worker_api_bearer_token.as_deref().unwrap_or_default();

        let run = match self.client.run_job(target_url, bearer_token, &request).await {
            Ok(run) => run,
            Err(e) => {
                tracing::warn!(
                    job_id = %job.id,
                    node_slug = %node.node_slug,
                    error = %e,
                    "Worker call failed"
                );
                return self.fail(job.id, e.to_string()).await;
            }
        };

        let status = run.response.job_status();
        let summary = (status == JobStatus::Completed).then(|| run.response.summary());

        self.complete(CompleteJob {
            job_id: job.id,
            status,
            result: run.raw,
            summary,
        })
        .await
    }

    async fn fail(&self, job_id: DbId, message: String) -> Result<JobStatus, DbError> {
        self.complete(CompleteJob {
            job_id,
            status: JobStatus::Failed,
            result: json!({ "error": message }),
            summary: None,
        })
        .await
    }

    async fn complete(&self, input: CompleteJob) -> Result<JobStatus, DbError> {
        if !self.store.complete_job(&input).await? {
            tracing::warn!(job_id = %input.job_id, "Job was no longer running at completion");
        }
        Ok(input.status)
    }
}
