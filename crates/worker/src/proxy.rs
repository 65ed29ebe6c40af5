//! Localhost reverse proxy in front of the node's inference backend.
//!
//! Gives sandboxed jobs a fixed endpoint regardless of how the backend is
//! deployed. Bodies are forwarded untouched and never logged.

use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Router;
use cynode_core::problem::ProblemKind;

use crate::error::problem_response;

/// Largest request body forwarded upstream.
pub const MAX_PROXY_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Per-request upstream timeout.
pub const PROXY_TIMEOUT: Duration = Duration::from_secs(120);

/// Headers that describe a single hop and must not be forwarded.
const HOP_BY_HOP: [header::HeaderName; 6] = [
    header::CONNECTION,
    header::HOST,
    header::CONTENT_LENGTH,
    header::TRANSFER_ENCODING,
    header::TE,
    header::UPGRADE,
];

#[derive(Clone)]
pub struct ProxyState {
    client: reqwest::Client,
    upstream: String,
}

impl ProxyState {
    pub fn new(upstream: impl Into<String>) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(PROXY_TIMEOUT).build()?;
        Ok(Self {
            client,
            upstream: upstream.into().trim_end_matches('/').to_string(),
        })
    }
}

fn forwardable(headers: &HeaderMap) -> HeaderMap {
    let mut out = headers.clone();
    for name in &HOP_BY_HOP {
        out.remove(name);
    }
    out
}

async fn forward(State(state): State<ProxyState>, request: Request) -> Response {
    let (parts, body) = request.into_parts();

    let body = match to_bytes(body, MAX_PROXY_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(_) => return problem_response(ProblemKind::PayloadTooLarge, None),
    };

    let path = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let url = format!("{}{path}", state.upstream);

    let upstream = state
        .client
        .request(parts.method, &url)
        .headers(forwardable(&parts.headers))
        .body(body)
        .send()
        .await;

    let upstream = match upstream {
        Ok(resp) => resp,
        Err(err) => {
            tracing::warn!(error = %err, "Inference backend unreachable");
            let status = if err.is_timeout() {
                StatusCode::GATEWAY_TIMEOUT
            } else {
                StatusCode::BAD_GATEWAY
            };
            return status.into_response();
        }
    };

    let status = upstream.status();
    let headers = forwardable(upstream.headers());
    match upstream.bytes().await {
        Ok(bytes) => {
            let mut response = Response::new(Body::from(bytes));
            *response.status_mut() = status;
            *response.headers_mut() = headers;
            response
        }
        Err(err) => {
            tracing::warn!(error = %err, "Failed to read inference backend response");
            StatusCode::BAD_GATEWAY.into_response()
        }
    }
}

/// Build the proxy router; every method and path is forwarded.
pub fn router(state: ProxyState) -> Router {
    Router::new().fallback(forward).with_state(state)
}
