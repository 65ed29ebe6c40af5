//! Per-job subprocess supervisor.
//!
//! Each job gets a private workspace directory, a wall-clock deadline, and
//! capped stdout/stderr buffers. Failures of the job itself are reported in
//! the [`JobRunResponse`]; only host-side problems (the workspace cannot be
//! created) surface as [`ExecutorError`].

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use chrono::Utc;
use cynode_core::job_run::{JobRunRequest, JobRunResponse, JobRunStatus, Truncated};
use cynode_core::PROTOCOL_VERSION;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

use crate::config::{ExecutorConfig, SandboxMode};

/// Read buffer size used while draining child output.
const READ_CHUNK: usize = 8 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    #[error("Failed to create job workspace: {0}")]
    Workspace(#[source] std::io::Error),
}

/// Bytes captured from one output stream.
#[derive(Debug, Default)]
struct Captured {
    bytes: Vec<u8>,
    truncated: bool,
}

impl Captured {
    /// Decode the captured bytes. A truncated buffer first drops a
    /// multi-byte character the cap cut in half, so the text stays a prefix
    /// of what the child wrote and never exceeds the cap.
    fn into_string(mut self) -> String {
        if self.truncated {
            let end = complete_utf8_len(&self.bytes);
            self.bytes.truncate(end);
        }
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

/// Length of `bytes` without a trailing incomplete UTF-8 sequence.
fn complete_utf8_len(bytes: &[u8]) -> usize {
    let len = bytes.len();
    // A UTF-8 sequence is at most 4 bytes, so only the last 3 can be a cut lead.
    for back in 1..=len.min(3) {
        let start = len - back;
        let byte = bytes[start];
        if byte & 0xC0 == 0x80 {
            continue;
        }
        let width = match byte {
            0xC0..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF7 => 4,
            _ => 1,
        };
        return if back < width { start } else { len };
    }
    len
}

/// How a supervised child ended.
enum Outcome {
    Exited {
        code: Option<i32>,
        success: bool,
        stdout: Captured,
        stderr: Captured,
    },
    SpawnFailed(std::io::Error),
    WaitFailed(std::io::Error),
    TimedOut,
}

#[derive(Debug, Clone)]
pub struct SandboxExecutor {
    config: ExecutorConfig,
}

impl SandboxExecutor {
    pub fn new(config: ExecutorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Execute one job to completion, timeout, or failure.
    pub async fn run(&self, request: &JobRunRequest) -> Result<JobRunResponse, ExecutorError> {
        let workspace = self.create_workspace()?;
        let timeout = self.effective_timeout(request);
        let started_at = Utc::now();

        tracing::info!(
            task_id = %request.task_id,
            job_id = %request.job_id,
            mode = ?self.config.mode,
            timeout_secs = timeout.as_secs_f64(),
            "Executing job"
        );

        let outcome = match self.build_command(request, workspace.path()) {
            Ok(command) => self.supervise(command, timeout).await,
            Err(err) => Outcome::SpawnFailed(err),
        };
        let ended_at = Utc::now();

        let (status, exit_code, stdout, stderr) = match outcome {
            Outcome::Exited {
                code,
                success,
                stdout,
                stderr,
            } => {
                let truncated = Truncated {
                    stdout: stdout.truncated,
                    stderr: stderr.truncated,
                };
                let status = if success {
                    JobRunStatus::Completed
                } else {
                    JobRunStatus::Failed
                };
                let exit_code = if success { 0 } else { code.unwrap_or(-1) };
                (
                    status,
                    exit_code,
                    (stdout.into_string(), truncated.stdout),
                    (stderr.into_string(), truncated.stderr),
                )
            }
            Outcome::SpawnFailed(err) | Outcome::WaitFailed(err) => (
                JobRunStatus::Failed,
                -1,
                (String::new(), false),
                (err.to_string(), false),
            ),
            Outcome::TimedOut => (
                JobRunStatus::Timeout,
                -1,
                (String::new(), false),
                (format!("job exceeded timeout of {}s", timeout.as_secs_f64()), false),
            ),
        };

        tracing::info!(
            task_id = %request.task_id,
            job_id = %request.job_id,
            status = ?status,
            exit_code,
            "Job finished"
        );

        // Dropping the TempDir removes the workspace.
        drop(workspace);

        Ok(JobRunResponse {
            version: PROTOCOL_VERSION,
            task_id: request.task_id.clone(),
            job_id: request.job_id.clone(),
            status,
            exit_code: Some(exit_code),
            stdout: stdout.0,
            stderr: stderr.0,
            started_at,
            ended_at,
            truncated: Truncated {
                stdout: stdout.1,
                stderr: stderr.1,
            },
        })
    }

    /// The job's own timeout when positive, else the process default.
    pub fn effective_timeout(&self, request: &JobRunRequest) -> Duration {
        match request.sandbox.timeout_seconds {
            Some(secs) if secs > 0 => Duration::from_secs(secs),
            _ => self.config.default_timeout,
        }
    }

    /// Argument vector passed to the container runtime for `request`.
    pub fn container_args(&self, request: &JobRunRequest) -> Vec<String> {
        let sandbox = &request.sandbox;
        let network = if sandbox.use_inference { "host" } else { "none" };

        let mut args = vec![
            "run".to_string(),
            "--rm".to_string(),
            format!("--network={network}"),
        ];
        for (key, value) in &sandbox.env {
            args.push("-e".into());
            args.push(format!("{key}={value}"));
        }
        args.push("--label".into());
        args.push(format!("cynodeai.task_id={}", request.task_id));
        args.push("--label".into());
        args.push(format!("cynodeai.job_id={}", request.job_id));
        args.push(
            sandbox
                .image
                .as_deref()
                .filter(|i| !i.is_empty())
                .unwrap_or(&self.config.default_image)
                .to_string(),
        );
        args.extend(sandbox.command.iter().cloned());
        args
    }

    fn build_command(
        &self,
        request: &JobRunRequest,
        workspace: &Path,
    ) -> std::io::Result<Command> {
        let mut command = match self.config.mode {
            SandboxMode::Container => {
                let mut cmd = Command::new(&self.config.runtime);
                cmd.args(self.container_args(request));
                cmd
            }
            SandboxMode::Direct => {
                let Some((program, args)) = request.sandbox.command.split_first() else {
                    return Err(std::io::Error::new(
                        std::io::ErrorKind::InvalidInput,
                        "sandbox.command is empty",
                    ));
                };
                let mut cmd = Command::new(program);
                cmd.args(args).envs(&request.sandbox.env);
                cmd
            }
        };
        command
            .current_dir(workspace)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        Ok(command)
    }

    fn create_workspace(&self) -> Result<tempfile::TempDir, ExecutorError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("cynode-job-");
        let dir = match &self.config.workspace_root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
        .map_err(ExecutorError::Workspace)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(dir.path(), std::fs::Permissions::from_mode(0o700))
                .map_err(ExecutorError::Workspace)?;
        }

        Ok(dir)
    }

    async fn supervise(&self, mut command: Command, timeout: Duration) -> Outcome {
        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(err) => return Outcome::SpawnFailed(err),
        };
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let max = self.config.max_output_bytes;

        let run = async {
            tokio::join!(
                read_capped(stdout, max),
                read_capped(stderr, max),
                child.wait()
            )
        };

        let result = tokio::time::timeout(timeout, run).await;
        match result {
            Ok((stdout, stderr, Ok(status))) => Outcome::Exited {
                code: status.code(),
                success: status.success(),
                stdout,
                stderr,
            },
            Ok((_, _, Err(err))) => Outcome::WaitFailed(err),
            Err(_) => {
                if let Err(err) = child.start_kill() {
                    tracing::warn!(error = %err, "Failed to kill timed-out job");
                }
                let _ = child.wait().await;
                Outcome::TimedOut
            }
        }
    }
}

/// Drain `reader` to EOF, keeping at most `max` bytes.
///
/// Reading continues past the cap so the child never blocks on a full pipe.
async fn read_capped<R>(reader: Option<R>, max: usize) -> Captured
where
    R: AsyncRead + Unpin,
{
    let Some(mut reader) = reader else {
        return Captured::default();
    };
    let mut captured = Captured::default();
    let mut chunk = vec![0u8; READ_CHUNK];
    loop {
        let n = match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) => {
                tracing::warn!(error = %err, "Error reading job output");
                break;
            }
        };
        let room = max.saturating_sub(captured.bytes.len());
        if n > room {
            captured.truncated = true;
        }
        captured.bytes.extend_from_slice(&chunk[..n.min(room)]);
    }
    captured
}

#[cfg(test)]
mod tests {
    use super::*;
    use cynode_core::job_run::SandboxSpec;

    fn request(command: &[&str]) -> JobRunRequest {
        JobRunRequest {
            version: 1,
            task_id: "task-1".into(),
            job_id: "job-1".into(),
            sandbox: SandboxSpec {
                command: command.iter().map(|s| s.to_string()).collect(),
                ..SandboxSpec::default()
            },
        }
    }

    fn direct(max_output_bytes: usize, default_timeout: Duration) -> SandboxExecutor {
        SandboxExecutor::new(ExecutorConfig {
            mode: SandboxMode::Direct,
            max_output_bytes,
            default_timeout,
            ..ExecutorConfig::default()
        })
    }

    #[test]
    fn container_args_isolate_network_and_label_the_job() {
        let exec = SandboxExecutor::new(ExecutorConfig::default());
        let mut req = request(&["echo", "hi"]);
        req.sandbox.env.insert("A".into(), "1".into());

        assert_eq!(
            exec.container_args(&req),
            vec![
                "run",
                "--rm",
                "--network=none",
                "-e",
                "A=1",
                "--label",
                "cynodeai.task_id=task-1",
                "--label",
                "cynodeai.job_id=job-1",
                "alpine:latest",
                "echo",
                "hi",
            ]
        );
    }

    #[test]
    fn inference_jobs_share_the_host_network() {
        let exec = SandboxExecutor::new(ExecutorConfig::default());
        let mut req = request(&["true"]);
        req.sandbox.use_inference = true;
        req.sandbox.image = Some("python:3.12-alpine".into());

        let args = exec.container_args(&req);
        assert_eq!(args[2], "--network=host");
        assert!(args.contains(&"python:3.12-alpine".to_string()));
    }

    #[test]
    fn positive_job_timeout_overrides_default() {
        let exec = direct(1024, Duration::from_secs(300));
        let mut req = request(&["true"]);
        assert_eq!(exec.effective_timeout(&req), Duration::from_secs(300));
        req.sandbox.timeout_seconds = Some(0);
        assert_eq!(exec.effective_timeout(&req), Duration::from_secs(300));
        req.sandbox.timeout_seconds = Some(7);
        assert_eq!(exec.effective_timeout(&req), Duration::from_secs(7));
    }

    #[tokio::test]
    async fn clean_exit_completes_with_output() {
        let exec = direct(1024, Duration::from_secs(10));
        let resp = exec.run(&request(&["sh", "-c", "echo hello"])).await.unwrap();

        assert_eq!(resp.status, JobRunStatus::Completed);
        assert_eq!(resp.exit_code, Some(0));
        assert_eq!(resp.stdout, "hello\n");
        assert_eq!(resp.truncated, Truncated::default());
        assert_eq!(resp.version, 1);
        assert_eq!(resp.task_id, "task-1");
    }

    #[tokio::test]
    async fn nonzero_exit_fails_with_real_code() {
        let exec = direct(1024, Duration::from_secs(10));
        let resp = exec
            .run(&request(&["sh", "-c", "echo oops >&2; exit 3"]))
            .await
            .unwrap();

        assert_eq!(resp.status, JobRunStatus::Failed);
        assert_eq!(resp.exit_code, Some(3));
        assert_eq!(resp.stderr, "oops\n");
    }

    #[tokio::test]
    async fn missing_binary_fails_with_error_in_stderr() {
        let exec = direct(1024, Duration::from_secs(10));
        let resp = exec
            .run(&request(&["/nonexistent/cynode-test-binary"]))
            .await
            .unwrap();

        assert_eq!(resp.status, JobRunStatus::Failed);
        assert_eq!(resp.exit_code, Some(-1));
        assert!(!resp.stderr.is_empty());
    }

    #[tokio::test]
    async fn deadline_kills_job_and_reports_timeout() {
        let exec = direct(1024, Duration::from_millis(5));
        let resp = exec.run(&request(&["sleep", "10"])).await.unwrap();

        assert_eq!(resp.status, JobRunStatus::Timeout);
        assert_eq!(resp.exit_code, Some(-1));
        assert!(resp.ended_at - resp.started_at < chrono::Duration::seconds(5));
    }

    #[tokio::test]
    async fn env_map_reaches_direct_children() {
        let exec = direct(1024, Duration::from_secs(10));
        let mut req = request(&["sh", "-c", "printf %s \"$GREETING\""]);
        req.sandbox.env.insert("GREETING".into(), "hi there".into());

        let resp = exec.run(&req).await.unwrap();
        assert_eq!(resp.stdout, "hi there");
    }

    #[tokio::test]
    async fn truncated_multibyte_output_stays_within_cap() {
        let exec = direct(5, Duration::from_secs(10));
        let resp = exec
            .run(&request(&["sh", "-c", r"printf '\303\251\303\251\303\251'"]))
            .await
            .unwrap();

        assert_eq!(resp.status, JobRunStatus::Completed);
        assert!(resp.truncated.stdout);
        assert_eq!(resp.stdout, "éé");
        assert!(resp.stdout.len() <= 5);
        assert!("ééé".starts_with(&resp.stdout));
    }

    #[test]
    fn incomplete_trailing_sequence_is_dropped() {
        assert_eq!(complete_utf8_len("abc".as_bytes()), 3);
        assert_eq!(complete_utf8_len(&"ééé".as_bytes()[..5]), 4);
        assert_eq!(complete_utf8_len(&"€".as_bytes()[..2]), 0);
        assert_eq!(complete_utf8_len(&"a😀".as_bytes()[..4]), 1);
        assert_eq!(complete_utf8_len("a😀".as_bytes()), 5);
        assert_eq!(complete_utf8_len(b""), 0);
    }

    #[test]
    fn untruncated_output_is_decoded_as_is() {
        let captured = Captured {
            bytes: "é".as_bytes()[..1].to_vec(),
            truncated: false,
        };
        assert_eq!(captured.into_string(), "\u{FFFD}");
    }

    #[tokio::test]
    async fn read_capped_keeps_prefix_and_flags_overflow() {
        let data: &[u8] = b"abcdefghij";
        let captured = read_capped(Some(data), 4).await;
        assert_eq!(captured.bytes, b"abcd");
        assert!(captured.truncated);

        let captured = read_capped(Some(data), 10).await;
        assert_eq!(captured.bytes, data);
        assert!(!captured.truncated);
    }
}
