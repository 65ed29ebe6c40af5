use std::str::FromStr;
use std::time::Duration;

use crate::auth::jwt::JwtConfig;

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

/// Read a variable that must be present and non-empty.
pub fn env_required(name: &'static str) -> Result<String, ConfigError> {
    env_opt(name).ok_or(ConfigError::Missing(name))
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

/// Worker-call timeout; must exceed the worker's default job timeout.
pub const DEFAULT_DISPATCH_HTTP_TIMEOUT_SECS: u64 = 330;

/// Control-plane configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `12080`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Largest accepted request body (default: 1 MiB).
    pub max_request_body_bytes: usize,
    /// Credential signing configuration.
    pub jwt: JwtConfig,
    /// Pre-shared key nodes present on registration.
    pub node_registration_psk: String,
    /// Externally reachable base URL, used to build endpoint URLs for nodes.
    pub public_url: String,
    /// Fallback worker-API URL when a node has none stored.
    pub worker_api_target_url: Option<String>,
    /// Fallback worker-API bearer token; a random one is minted when unset.
    pub worker_api_bearer_token: Option<String>,
    pub sandbox_registry_url: String,
    pub model_cache_url: String,
    /// Inference backend image handed to nodes; no backend when unset.
    pub inference_backend_image: Option<String>,
    pub inference_model: String,
    /// Image that runs prompt-mode jobs.
    pub prompt_mode_image: String,
    pub login_rate_limit_per_minute: u32,
    pub dispatch_tick: Duration,
    pub dispatch_http_timeout: Duration,
    /// Active nodes silent for longer become inactive; zero disables the sweep.
    pub node_stale_after: Duration,
    pub bootstrap_admin_handle: String,
    pub bootstrap_admin_password: Option<String>,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                       | Default                  |
    /// |-------------------------------|--------------------------|
    /// | `HOST`                        | `0.0.0.0`                |
    /// | `PORT`                        | `12080`                  |
    /// | `CORS_ORIGINS`                | `http://localhost:5173`  |
    /// | `REQUEST_TIMEOUT_SECS`        | `30`                     |
    /// | `MAX_REQUEST_BODY_BYTES`      | `1048576`                |
    /// | `NODE_REGISTRATION_PSK`       | required                 |
    /// | `ORCHESTRATOR_PUBLIC_URL`     | `http://localhost:12080` |
    /// | `WORKER_API_TARGET_URL`       | unset                    |
    /// | `WORKER_API_BEARER_TOKEN`     | unset                    |
    /// | `SANDBOX_REGISTRY_URL`        | empty                    |
    /// | `MODEL_CACHE_URL`             | empty                    |
    /// | `INFERENCE_BACKEND_IMAGE`     | unset                    |
    /// | `INFERENCE_MODEL`             | `tinyllama`              |
    /// | `PROMPT_MODE_IMAGE`           | `python:3.12-alpine`     |
    /// | `LOGIN_RATE_LIMIT_PER_MINUTE` | `10`                     |
    /// | `DISPATCH_TICK_MS`            | `1000`                   |
    /// | `DISPATCH_HTTP_TIMEOUT_SECS`  | `330`                    |
    /// | `NODE_STALE_AFTER_SECS`       | `300`                    |
    /// | `BOOTSTRAP_ADMIN_HANDLE`      | `admin`                  |
    /// | `BOOTSTRAP_ADMIN_PASSWORD`    | unset                    |
    ///
    /// plus the `JWT_*` variables of [`JwtConfig::from_env`].
    pub fn from_env() -> Result<Self, ConfigError> {
        let cors_origins = env_opt("CORS_ORIGINS")
            .unwrap_or_else(|| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            host: env_opt("HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: env_parse("PORT", 12080)?,
            cors_origins,
            request_timeout_secs: env_parse("REQUEST_TIMEOUT_SECS", 30)?,
            max_request_body_bytes: env_parse("MAX_REQUEST_BODY_BYTES", 1024 * 1024)?,
            jwt: JwtConfig::from_env()?,
            node_registration_psk: env_required("NODE_REGISTRATION_PSK")?,
            public_url: env_opt("ORCHESTRATOR_PUBLIC_URL")
                .unwrap_or_else(|| "http://localhost:12080".into())
                .trim_end_matches('/')
                .to_string(),
            worker_api_target_url: env_opt("WORKER_API_TARGET_URL"),
            worker_api_bearer_token: env_opt("WORKER_API_BEARER_TOKEN"),
            sandbox_registry_url: env_opt("SANDBOX_REGISTRY_URL").unwrap_or_default(),
            model_cache_url: env_opt("MODEL_CACHE_URL").unwrap_or_default(),
            inference_backend_image: env_opt("INFERENCE_BACKEND_IMAGE"),
            inference_model: env_opt("INFERENCE_MODEL").unwrap_or_else(|| "tinyllama".into()),
            prompt_mode_image: env_opt("PROMPT_MODE_IMAGE")
                .unwrap_or_else(|| "python:3.12-alpine".into()),
            login_rate_limit_per_minute: env_parse("LOGIN_RATE_LIMIT_PER_MINUTE", 10)?,
            dispatch_tick: Duration::from_millis(env_parse("DISPATCH_TICK_MS", 1000)?),
            dispatch_http_timeout: Duration::from_secs(env_parse(
                "DISPATCH_HTTP_TIMEOUT_SECS",
                DEFAULT_DISPATCH_HTTP_TIMEOUT_SECS,
            )?),
            node_stale_after: Duration::from_secs(env_parse("NODE_STALE_AFTER_SECS", 300)?),
            bootstrap_admin_handle: env_opt("BOOTSTRAP_ADMIN_HANDLE")
                .unwrap_or_else(|| "admin".into()),
            bootstrap_admin_password: env_opt("BOOTSTRAP_ADMIN_PASSWORD"),
        })
    }

    /// Absolute URL of a control-plane path.
    pub fn public_endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.public_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_parse_rejects_garbage() {
        // Unique name so parallel tests never collide.
        std::env::set_var("CYNODE_TEST_PARSE_GARBAGE", "not-a-number");
        let result: Result<u16, _> = env_parse("CYNODE_TEST_PARSE_GARBAGE", 1);
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
        std::env::remove_var("CYNODE_TEST_PARSE_GARBAGE");
    }

    #[test]
    fn dispatch_timeout_outlasts_default_job_timeout() {
        let job_timeout = cynode_worker::config::ExecutorConfig::default().default_timeout;
        assert!(Duration::from_secs(DEFAULT_DISPATCH_HTTP_TIMEOUT_SECS) > job_timeout);
    }

    #[test]
    fn env_parse_falls_back_when_unset() {
        let value: u64 = env_parse("CYNODE_TEST_PARSE_UNSET", 42).unwrap();
        assert_eq!(value, 42);
    }
}
