//! Transparent HTTP forwarding to worker processes.
//!
//! Method, headers and body are passed through; the worker's response
//! status, headers and body are relayed verbatim, failure statuses included.
//! Only hop-by-hop headers are stripped.

use std::time::Duration;

use bytes::Bytes;
use futures_util::TryStreamExt;
use http::{HeaderMap, Method, StatusCode};
use multipack_core::{ByteStream, ForwardError, Target};
use reqwest::Client;
use tracing::debug;

use crate::process::WorkerHandle;

/// Headers that are never forwarded in either direction.
const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailers",
    "transfer-encoding",
    "upgrade",
];

/// Headers recomputed by the client for the outgoing request.
const REQUEST_ONLY_HEADERS: &[&str] = &["host", "content-length"];

/// Check if a request header should be forwarded.
pub fn should_forward_header(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    !HOP_BY_HOP_HEADERS.contains(&lower.as_str()) && !REQUEST_ONLY_HEADERS.contains(&lower.as_str())
}

/// Check if a response header should be relayed.
pub fn should_relay_header(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    !HOP_BY_HOP_HEADERS.contains(&lower.as_str())
}

fn filtered(headers: &HeaderMap, keep: fn(&str) -> bool) -> HeaderMap {
    headers
        .iter()
        .filter(|(name, _)| keep(name.as_str()))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

/// An inbound request to pass through to a worker.
#[derive(Debug, Clone)]
pub struct ForwardRequest {
    pub method: Method,
    /// Path plus optional query, e.g. `/index.bundle?platform=ios`.
    pub path_and_query: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// The worker's response, body still streaming.
pub struct ForwardResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: ByteStream,
}

impl std::fmt::Debug for ForwardResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForwardResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Send `request` to `worker` and wait up to `timeout` for the response head.
pub async fn forward_to(
    client: &Client,
    worker: &WorkerHandle,
    request: ForwardRequest,
    timeout: Duration,
) -> Result<ForwardResponse, ForwardError> {
    let url = format!("{}{}", worker.base_url(), normalize_path(&request.path_and_query));
    debug!(target = %worker.target, %url, method = %request.method, "Forwarding request");

    let send = client
        .request(request.method, &url)
        .headers(filtered(&request.headers, should_forward_header))
        .body(request.body)
        .send();

    let response = tokio::time::timeout(timeout, send)
        .await
        .map_err(|_| timeout_error(&worker.target, timeout))?
        .map_err(|e| unreachable_error(&worker.target, &e))?;

    Ok(ForwardResponse {
        status: response.status(),
        headers: filtered(response.headers(), should_relay_header),
        body: Box::pin(response.bytes_stream().map_err(std::io::Error::other)),
    })
}

fn normalize_path(path_and_query: &str) -> String {
    if path_and_query.starts_with('/') {
        path_and_query.to_string()
    } else {
        format!("/{path_and_query}")
    }
}

pub(crate) fn timeout_error(target: &Target, timeout: Duration) -> ForwardError {
    ForwardError::Timeout {
        target: target.clone(),
        timeout_secs: timeout.as_secs(),
    }
}

pub(crate) fn unreachable_error(target: &Target, error: &reqwest::Error) -> ForwardError {
    ForwardError::Unreachable {
        target: target.clone(),
        reason: error.to_string(),
    }
}
