use cynode_core::error::CoreError;
use cynode_worker::config::ConfigError;

/// Failures of the node manager.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned HTTP {status}: {body}")]
    Status { url: String, status: u16, body: String },

    #[error("protocol error: {0}")]
    Protocol(#[from] CoreError),

    #[error("failed to start {service}: {reason}")]
    ServiceStart { service: &'static str, reason: String },
}

impl AgentError {
    /// HTTP status of an unexpected response, if that is what this is.
    pub fn status(&self) -> Option<u16> {
        match self {
            AgentError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}
