//! Node manager startup sequence and capability report loop.
//!
//! Startup: register, fetch configuration, start the services it names,
//! acknowledge. Any failure up to and including the acknowledgement is
//! fatal. After startup a capability report is sent every
//! `report_interval`; failures there are logged and the loop carries on.

use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use cynode_core::node_protocol::{
    BootstrapPayload, ConfigAck, ConfigAckError, NodeConfigPayload,
};
use cynode_core::status::ConfigAckStatus;
use cynode_core::PROTOCOL_VERSION;

use crate::client::OrchestratorClient;
use crate::collector::CapabilityCollector;
use crate::config::AgentConfig;
use crate::error::AgentError;
use crate::services::{self, InferenceService, RunningService};

/// Node credential and URLs handed out at registration.
#[derive(Debug, Clone)]
pub struct NodeSession {
    pub node_jwt: String,
    pub expires_at: chrono::DateTime<chrono::Utc>,
    pub report_url: String,
    pub config_url: String,
}

impl From<BootstrapPayload> for NodeSession {
    fn from(bootstrap: BootstrapPayload) -> Self {
        Self {
            node_jwt: bootstrap.auth.node_jwt,
            expires_at: bootstrap.auth.expires_at,
            report_url: bootstrap.orchestrator.endpoints.node_report_url,
            config_url: bootstrap.orchestrator.endpoints.node_config_url,
        }
    }
}

/// Everything running once startup has completed.
#[derive(Debug)]
pub struct StartedNode {
    pub session: NodeSession,
    pub config: NodeConfigPayload,
    pub worker_api: Option<RunningService>,
    pub inference: Option<InferenceService>,
    services_cancel: CancellationToken,
}

impl StartedNode {
    /// Stop local services and wait for them to exit.
    pub async fn shutdown(self) {
        self.services_cancel.cancel();
        if let Some(worker_api) = self.worker_api {
            worker_api.join().await;
        }
        if let Some(inference) = self.inference {
            inference.stop().await;
        }
        tracing::info!("Local services stopped");
    }
}

#[derive(Debug)]
pub struct NodeManager {
    config: AgentConfig,
    client: OrchestratorClient,
    collector: CapabilityCollector,
}

impl NodeManager {
    /// Validate the configuration and build the control-plane client.
    pub fn new(config: AgentConfig, collector: CapabilityCollector) -> Result<Self, AgentError> {
        config.validate()?;
        let client = OrchestratorClient::new(&config.orchestrator_url, config.http_timeout)?;
        Ok(Self {
            config,
            client,
            collector,
        })
    }

    /// Start up, then report capabilities until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), AgentError> {
        let mut node = self.start(&cancel).await?;
        self.report_loop(&mut node.session, &cancel).await;
        node.shutdown().await;
        Ok(())
    }

    async fn register(&self) -> Result<NodeSession, AgentError> {
        let report = self.collector.collect();
        let bootstrap = self
            .client
            .register(&self.config.registration_psk, &report)
            .await?;
        tracing::info!(
            node_slug = %self.config.node_slug,
            expires_at = %bootstrap.auth.expires_at,
            "Registered with control plane"
        );
        Ok(NodeSession::from(bootstrap))
    }

    /// Run the startup sequence up to and including the config ack.
    pub async fn start(&self, cancel: &CancellationToken) -> Result<StartedNode, AgentError> {
        let session = self.register().await?;

        let config = self
            .client
            .fetch_config(&session.config_url, &session.node_jwt)
            .await?;
        tracing::info!(config_version = %config.config_version, "Fetched node configuration");

        let mut node = StartedNode {
            session,
            config,
            worker_api: None,
            inference: None,
            services_cancel: cancel.child_token(),
        };

        if let Err(e) = self.start_services(&mut node).await {
            tracing::error!(error = %e, "Failed to apply node configuration");
            let ack = self.ack(&node.config, ConfigAckStatus::Failed, Some(ack_error(&e)));
            if let Err(ack_err) = self
                .client
                .ack_config(&node.session.config_url, &node.session.node_jwt, &ack)
                .await
            {
                tracing::warn!(error = %ack_err, "Failed to send failed config ack");
            }
            node.shutdown().await;
            return Err(e);
        }

        let ack = self.ack(&node.config, ConfigAckStatus::Applied, None);
        if let Err(e) = self
            .client
            .ack_config(&node.session.config_url, &node.session.node_jwt, &ack)
            .await
        {
            node.shutdown().await;
            return Err(e);
        }
        tracing::info!(config_version = %node.config.config_version, "Node configuration applied");
        Ok(node)
    }

    async fn start_services(&self, node: &mut StartedNode) -> Result<(), AgentError> {
        if let Some(worker_api) = &node.config.worker_api {
            let service = services::start_worker_api(
                self.config.worker_listen_addr,
                self.config.executor.clone(),
                &worker_api.orchestrator_bearer_token,
                node.services_cancel.clone(),
            )
            .await?;
            node.worker_api = Some(service);
        }

        if let Some(backend) = &node.config.inference_backend {
            let inference = InferenceService::start(
                &self.config.executor.runtime,
                backend,
                self.config.inference_proxy_addr,
                &self.config.inference_backend_url,
                node.services_cancel.clone(),
            )
            .await?;
            node.inference = Some(inference);
        }
        Ok(())
    }

    fn ack(
        &self,
        config: &NodeConfigPayload,
        status: ConfigAckStatus,
        error: Option<ConfigAckError>,
    ) -> ConfigAck {
        ConfigAck {
            version: PROTOCOL_VERSION,
            node_slug: self.config.node_slug.clone(),
            config_version: config.config_version.clone(),
            ack_at: chrono::Utc::now(),
            status,
            error,
        }
    }

    async fn report_loop(&self, session: &mut NodeSession, cancel: &CancellationToken) {
        let period = self.config.report_interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(interval_secs = period.as_secs(), "Capability report loop started");

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    tracing::info!("Capability report loop stopping");
                    return;
                }
                _ = ticker.tick() => {
                    self.report_once(session).await;
                }
            }
        }
    }

    /// Send one report. An expired credential triggers re-registration.
    async fn report_once(&self, session: &mut NodeSession) {
        let report = self.collector.collect();
        let result = self
            .client
            .report_capability(&session.report_url, &session.node_jwt, &report)
            .await;

        match result {
            Ok(()) => tracing::debug!("Capability report sent"),
            Err(e) if e.status() == Some(401) => {
                tracing::warn!("Node credential rejected, re-registering");
                match self.register().await {
                    Ok(renewed) => *session = renewed,
                    Err(e) => tracing::warn!(error = %e, "Re-registration failed"),
                }
            }
            Err(e) => tracing::warn!(error = %e, "Capability report failed"),
        }
    }
}

fn ack_error(error: &AgentError) -> ConfigAckError {
    let kind = match error {
        AgentError::ServiceStart { .. } => "service_start",
        _ => "config_apply",
    };
    ConfigAckError {
        kind: kind.to_string(),
        message: error.to_string(),
        details: None,
    }
}
