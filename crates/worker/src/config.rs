use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Read an optional variable, treating empty values as unset.
pub fn env_opt(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Read and parse a variable, falling back to `default` when unset.
pub fn env_parse<T>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_opt(name) {
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

/// How the executor launches a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SandboxMode {
    /// `<runtime> run --rm ...` per job.
    Container,
    /// Run the command directly on the host (development only).
    Direct,
}

impl FromStr for SandboxMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "container" => Ok(SandboxMode::Container),
            "direct" => Ok(SandboxMode::Direct),
            other => Err(format!("expected 'container' or 'direct', got '{other}'")),
        }
    }
}

/// Process-level executor settings.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    pub mode: SandboxMode,
    /// Container CLI, e.g. `podman` or `docker`.
    pub runtime: String,
    pub default_image: String,
    pub default_timeout: Duration,
    /// Cap applied separately to stdout and stderr.
    pub max_output_bytes: usize,
    /// Parent of per-job workspaces; the system temp dir when `None`.
    pub workspace_root: Option<PathBuf>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            mode: SandboxMode::Container,
            runtime: "podman".into(),
            default_image: "alpine:latest".into(),
            default_timeout: Duration::from_secs(300),
            max_output_bytes: 1024 * 1024,
            workspace_root: None,
        }
    }
}

impl ExecutorConfig {
    /// Load executor settings from the environment.
    ///
    /// | Env Var                 | Default          |
    /// |-------------------------|------------------|
    /// | `SANDBOX_MODE`          | `container`      |
    /// | `CONTAINER_RUNTIME`     | `podman`         |
    /// | `SANDBOX_DEFAULT_IMAGE` | `alpine:latest`  |
    /// | `DEFAULT_TIMEOUT_SECS`  | `300`            |
    /// | `MAX_OUTPUT_BYTES`      | `1048576`        |
    /// | `WORKSPACE_ROOT`        | system temp dir  |
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            mode: env_parse("SANDBOX_MODE", defaults.mode)?,
            runtime: env_opt("CONTAINER_RUNTIME").unwrap_or(defaults.runtime),
            default_image: env_opt("SANDBOX_DEFAULT_IMAGE").unwrap_or(defaults.default_image),
            default_timeout: Duration::from_secs(env_parse("DEFAULT_TIMEOUT_SECS", 300)?),
            max_output_bytes: env_parse("MAX_OUTPUT_BYTES", defaults.max_output_bytes)?,
            workspace_root: env_opt("WORKSPACE_ROOT").map(PathBuf::from),
        })
    }
}

/// Configuration of the standalone worker binary.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub listen_addr: SocketAddr,
    /// Bearer token the control plane must present.
    pub bearer_token: String,
    pub executor: ExecutorConfig,
}

impl WorkerConfig {
    /// Load configuration from environment variables.
    ///
    /// | Env Var                   | Default         |
    /// |---------------------------|-----------------|
    /// | `WORKER_API_LISTEN_ADDR`  | `0.0.0.0:12090` |
    /// | `WORKER_API_BEARER_TOKEN` | required        |
    ///
    /// plus the executor variables of [`ExecutorConfig::from_env`].
    pub fn from_env() -> Result<Self, ConfigError> {
        let listen_addr = env_parse(
            "WORKER_API_LISTEN_ADDR",
            SocketAddr::from(([0, 0, 0, 0], 12090)),
        )?;
        let bearer_token =
            env_opt("WORKER_API_BEARER_TOKEN").ok_or(ConfigError::Missing("WORKER_API_BEARER_TOKEN"))?;

        Ok(Self {
            listen_addr,
            bearer_token,
            executor: ExecutorConfig::from_env()?,
        })
    }
}
