//! Local services the node manager starts from its configuration: the
//! worker API and the inference container with its proxy.

use std::net::SocketAddr;

use axum::Router;
use tokio::net::TcpListener;
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use cynode_core::node_protocol::InferenceBackendConfig;
use cynode_worker::config::ExecutorConfig;
use cynode_worker::executor::SandboxExecutor;
use cynode_worker::proxy::{self, ProxyState};
use cynode_worker::server::{self, WorkerState};

use crate::config::INFERENCE_CONTAINER_NAME;
use crate::error::AgentError;

/// Port the inference container listens on inside the container.
const INFERENCE_CONTAINER_PORT: u16 = 11434;

/// An HTTP service bound and serving in the background.
#[derive(Debug)]
pub struct RunningService {
    pub name: &'static str,
    pub addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl RunningService {
    /// Wait for the server task to exit after cancellation.
    pub async fn join(self) {
        if let Err(e) = self.handle.await {
            tracing::error!(service = self.name, error = %e, "Service task failed");
        }
    }
}

/// Bind `addr` and serve `app` until `cancel` fires.
async fn serve(
    name: &'static str,
    addr: SocketAddr,
    app: Router,
    cancel: CancellationToken,
) -> Result<RunningService, AgentError> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| AgentError::ServiceStart {
            service: name,
            reason: format!("failed to bind {addr}: {e}"),
        })?;
    let addr = listener.local_addr().map_err(|e| AgentError::ServiceStart {
        service: name,
        reason: e.to_string(),
    })?;
    tracing::info!(service = name, %addr, "Service listening");

    let handle = tokio::spawn(async move {
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(cancel.cancelled_owned())
            .await;
        if let Err(e) = result {
            tracing::error!(service = name, error = %e, "Service stopped with error");
        }
    });
    Ok(RunningService { name, addr, handle })
}

/// Start the worker API, accepting `bearer_token` from the control plane.
pub async fn start_worker_api(
    addr: SocketAddr,
    executor: ExecutorConfig,
    bearer_token: &str,
    cancel: CancellationToken,
) -> Result<RunningService, AgentError> {
    let state = WorkerState::new(SandboxExecutor::new(executor), bearer_token);
    serve("worker_api", addr, server::router(state), cancel).await
}

/// Arguments for `<runtime> run` starting the inference container.
pub fn inference_container_args(backend: &InferenceBackendConfig, backend_port: u16) -> Vec<String> {
    let mut args = vec![
        "run".to_string(),
        "-d".to_string(),
        "--rm".to_string(),
        "--name".to_string(),
        INFERENCE_CONTAINER_NAME.to_string(),
        "-p".to_string(),
        format!("127.0.0.1:{backend_port}:{INFERENCE_CONTAINER_PORT}"),
    ];
    if let Some(model) = &backend.model {
        args.push("-e".to_string());
        args.push(format!("OLLAMA_MODEL={model}"));
    }
    args.push(backend.image.clone());
    args
}

/// The inference container plus the proxy in front of it.
#[derive(Debug)]
pub struct InferenceService {
    runtime: String,
    pub proxy: RunningService,
}

impl InferenceService {
    /// Start the container, then the proxy forwarding to `backend_url`.
    pub async fn start(
        runtime: &str,
        backend: &InferenceBackendConfig,
        proxy_addr: SocketAddr,
        backend_url: &str,
        cancel: CancellationToken,
    ) -> Result<Self, AgentError> {
        let backend_port = reqwest::Url::parse(backend_url)
            .ok()
            .and_then(|u| u.port_or_known_default())
            .ok_or_else(|| AgentError::ServiceStart {
                service: "inference",
                reason: format!("invalid inference backend URL {backend_url}"),
            })?;

        let args = inference_container_args(backend, backend_port);
        tracing::info!(runtime, image = %backend.image, "Starting inference container");
        let output = Command::new(runtime)
            .args(&args)
            .output()
            .await
            .map_err(|e| AgentError::ServiceStart {
                service: "inference",
                reason: format!("failed to run {runtime}: {e}"),
            })?;
        if !output.status.success() {
            return Err(AgentError::ServiceStart {
                service: "inference",
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let state = ProxyState::new(backend_url).map_err(|e| AgentError::ServiceStart {
            service: "inference_proxy",
            reason: e.to_string(),
        })?;
        let proxy = match serve("inference_proxy", proxy_addr, proxy::router(state), cancel).await {
            Ok(proxy) => proxy,
            Err(e) => {
                remove_container(runtime).await;
                return Err(e);
            }
        };

        Ok(Self {
            runtime: runtime.to_string(),
            proxy,
        })
    }

    /// Wait for the proxy to stop, then remove the container.
    pub async fn stop(self) {
        self.proxy.join().await;
        remove_container(&self.runtime).await;
    }
}

async fn remove_container(runtime: &str) {
    match Command::new(runtime)
        .args(["rm", "-f", INFERENCE_CONTAINER_NAME])
        .output()
        .await
    {
        Ok(output) if output.status.success() => {
            tracing::info!("Inference container removed");
        }
        Ok(output) => tracing::warn!(
            stderr = %String::from_utf8_lossy(&output.stderr).trim(),
            "Failed to remove inference container"
        ),
        Err(e) => tracing::warn!(error = %e, "Failed to remove inference container"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inference_container_binds_loopback_only() {
        let backend = InferenceBackendConfig {
            image: "ollama/ollama".into(),
            model: None,
        };
        let args = inference_container_args(&backend, 11435);
        assert_eq!(
            args,
            [
                "run",
                "-d",
                "--rm",
                "--name",
                "cynode-inference",
                "-p",
                "127.0.0.1:11435:11434",
                "ollama/ollama"
            ]
        );
    }

    #[test]
    fn inference_model_is_passed_to_container() {
        let backend = InferenceBackendConfig {
            image: "ollama/ollama".into(),
            model: Some("tinyllama".into()),
        };
        let args = inference_container_args(&backend, 11435);
        let image_pos = args.iter().position(|a| a == "ollama/ollama").unwrap();
        assert_eq!(image_pos, args.len() - 1);
        assert!(args.contains(&"OLLAMA_MODEL=tinyllama".to_string()));
    }

    #[tokio::test]
    async fn worker_api_reports_bound_address_and_stops_on_cancel() {
        let cancel = CancellationToken::new();
        let service = start_worker_api(
            SocketAddr::from(([127, 0, 0, 1], 0)),
            ExecutorConfig::default(),
            "token",
            cancel.clone(),
        )
        .await
        .unwrap();
        assert_ne!(service.addr.port(), 0);

        cancel.cancel();
        tokio::time::timeout(std::time::Duration::from_secs(5), service.join())
            .await
            .unwrap();
    }
}
