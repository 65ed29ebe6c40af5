//! HTTP client for the control plane's node endpoints.

use std::time::Duration;

use cynode_core::node_protocol::{
    BootstrapPayload, CapabilityReport, ConfigAck, NodeConfigPayload, NodeRegistrationRequest,
};
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;

use crate::error::AgentError;

/// Registration path, relative to the configured orchestrator URL.
pub const REGISTER_PATH: &str = "/v1/nodes/register";

/// Error bodies longer than this are cut before being reported.
const MAX_ERROR_BODY_CHARS: usize = 512;

#[derive(Debug, Clone)]
pub struct OrchestratorClient {
    http: reqwest::Client,
    base_url: String,
}

impl OrchestratorClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, AgentError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Register with the pre-shared key and return the validated bootstrap.
    ///
    /// Both 201 (new node) and 200 (re-registration) are success.
    pub async fn register(
        &self,
        psk: &str,
        capability: &CapabilityReport,
    ) -> Result<BootstrapPayload, AgentError> {
        let url = format!("{}{REGISTER_PATH}", self.base_url);
        let body = NodeRegistrationRequest {
            psk: psk.to_string(),
            capability: capability.clone(),
        };
        let bootstrap: BootstrapPayload =
            decode(&url, self.http.post(&url).json(&body)).await?;
        bootstrap.validate()?;
        Ok(bootstrap)
    }

    /// `GET` the node configuration.
    pub async fn fetch_config(
        &self,
        config_url: &str,
        node_jwt: &str,
    ) -> Result<NodeConfigPayload, AgentError> {
        let config: NodeConfigPayload =
            decode(config_url, self.http.get(config_url).bearer_auth(node_jwt)).await?;
        config.validate()?;
        Ok(config)
    }

    /// `POST` an acknowledgement of the configuration to the same URL.
    pub async fn ack_config(
        &self,
        config_url: &str,
        node_jwt: &str,
        ack: &ConfigAck,
    ) -> Result<(), AgentError> {
        send(config_url, self.http.post(config_url).bearer_auth(node_jwt).json(ack)).await?;
        Ok(())
    }

    pub async fn report_capability(
        &self,
        report_url: &str,
        node_jwt: &str,
        report: &CapabilityReport,
    ) -> Result<(), AgentError> {
        send(report_url, self.http.post(report_url).bearer_auth(node_jwt).json(report)).await?;
        Ok(())
    }
}

/// Send a request, mapping any non-2xx status to [`AgentError::Status`].
async fn send(url: &str, request: RequestBuilder) -> Result<Response, AgentError> {
    let response = request.send().await?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body: String = response
        .text()
        .await
        .unwrap_or_default()
        .chars()
        .take(MAX_ERROR_BODY_CHARS)
        .collect();
    Err(AgentError::Status {
        url: url.to_string(),
        status: status.as_u16(),
        body,
    })
}

async fn decode<T: DeserializeOwned>(url: &str, request: RequestBuilder) -> Result<T, AgentError> {
    Ok(send(url, request).await?.json().await?)
}
