use std::net::SocketAddr;
use std::time::Duration;

use cynode_worker::config::{env_opt, env_parse, ConfigError, ExecutorConfig};

/// Name of the inference container the agent manages.
pub const INFERENCE_CONTAINER_NAME: &str = "cynode-inference";

/// Node manager configuration.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Control-plane base URL used for registration.
    pub orchestrator_url: String,
    pub node_slug: String,
    pub node_name: String,
    pub registration_psk: String,
    pub report_interval: Duration,
    /// Timeout applied to every call to the control plane.
    pub http_timeout: Duration,
    pub worker_listen_addr: SocketAddr,
    pub executor: ExecutorConfig,
    pub inference_proxy_addr: SocketAddr,
    /// Where the inference container is published on the host.
    pub inference_backend_url: String,
}

impl AgentConfig {
    /// Load configuration from environment variables.
    ///
    /// | Env Var                           | Default                  |
    /// |-----------------------------------|--------------------------|
    /// | `ORCHESTRATOR_URL`                | required                 |
    /// | `NODE_SLUG`                       | required                 |
    /// | `NODE_REGISTRATION_PSK`           | required                 |
    /// | `NODE_NAME`                       | `NODE_SLUG`              |
    /// | `CAPABILITY_REPORT_INTERVAL_SECS` | `60`                     |
    /// | `HTTP_TIMEOUT_SECS`               | `30`                     |
    /// | `WORKER_API_LISTEN_ADDR`          | `0.0.0.0:12090`          |
    /// | `INFERENCE_PROXY_LISTEN_ADDR`     | `127.0.0.1:11434`        |
    /// | `INFERENCE_BACKEND_URL`           | `http://127.0.0.1:11435` |
    ///
    /// plus the executor variables of [`ExecutorConfig::from_env`].
    pub fn from_env() -> Result<Self, ConfigError> {
        let node_slug = env_opt("NODE_SLUG").unwrap_or_default();
        let config = Self {
            orchestrator_url: env_opt("ORCHESTRATOR_URL").unwrap_or_default(),
            node_name: env_opt("NODE_NAME").unwrap_or_else(|| node_slug.clone()),
            node_slug,
            registration_psk: env_opt("NODE_REGISTRATION_PSK").unwrap_or_default(),
            report_interval: Duration::from_secs(env_parse("CAPABILITY_REPORT_INTERVAL_SECS", 60)?),
            http_timeout: Duration::from_secs(env_parse("HTTP_TIMEOUT_SECS", 30)?),
            worker_listen_addr: env_parse(
                "WORKER_API_LISTEN_ADDR",
                SocketAddr::from(([0, 0, 0, 0], 12090)),
            )?,
            executor: ExecutorConfig::from_env()?,
            inference_proxy_addr: env_parse(
                "INFERENCE_PROXY_LISTEN_ADDR",
                SocketAddr::from(([127, 0, 0, 1], 11434)),
            )?,
            inference_backend_url: env_opt("INFERENCE_BACKEND_URL")
                .unwrap_or_else(|| "http://127.0.0.1:11435".into()),
        };
        config.validate()?;
        Ok(config)
    }

    /// Orchestrator URL, node slug and registration key must be non-empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.orchestrator_url.trim().is_empty() {
            return Err(ConfigError::Missing("ORCHESTRATOR_URL"));
        }
        if self.node_slug.trim().is_empty() {
            return Err(ConfigError::Missing("NODE_SLUG"));
        }
        if self.registration_psk.is_empty() {
            return Err(ConfigError::Missing("NODE_REGISTRATION_PSK"));
        }
        if self.report_interval.is_zero() {
            return Err(ConfigError::Invalid {
                name: "CAPABILITY_REPORT_INTERVAL_SECS",
                reason: "must be greater than zero".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn config() -> AgentConfig {
        AgentConfig {
            orchestrator_url: "http://cp:12080".into(),
            node_slug: "n1".into(),
            node_name: "n1".into(),
            registration_psk: "psk".into(),
            report_interval: Duration::from_secs(60),
            http_timeout: Duration::from_secs(30),
            worker_listen_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            executor: ExecutorConfig::default(),
            inference_proxy_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            inference_backend_url: "http://127.0.0.1:11435".into(),
        }
    }

    #[test]
    fn complete_config_validates() {
        assert!(config().validate().is_ok());
    }

    #[test]
    fn required_fields_must_be_non_empty() {
        let mut c = config();
        c.orchestrator_url = " ".into();
        assert_matches!(c.validate(), Err(ConfigError::Missing("ORCHESTRATOR_URL")));

        let mut c = config();
        c.node_slug = String::new();
        assert_matches!(c.validate(), Err(ConfigError::Missing("NODE_SLUG")));

        let mut c = config();
        c.registration_psk = String::new();
        assert_matches!(c.validate(), Err(ConfigError::Missing("NODE_REGISTRATION_PSK")));
    }
}
