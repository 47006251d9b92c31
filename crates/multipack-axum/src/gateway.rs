//! Deployment-mode dispatch for asset requests.
//!
//! The backend variant is chosen once at startup. In-process mode serves
//! assets straight from the backend facade; multi-process mode forwards the
//! original request to the target's worker and relays its answer verbatim.

use std::sync::Arc;

use axum::body::{Body, to_bytes};
use axum::extract::Request;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use multipack_core::{Asset, AssetBody, BuildBackend, Target};
use multipack_runtime::{
    ForwardRequest, ForwardResponse, InProcessBackend, ProxiedBackend, WorkerInfo,
};

use crate::error::HttpError;

/// Largest request body forwarded to a worker.
const MAX_FORWARD_BODY: usize = 64 * 1024 * 1024;

/// Backend selected at startup.
#[derive(Debug, Clone)]
pub enum Gateway {
    /// Every target compiles inside this process.
    InProcess(Arc<InProcessBackend>),
    /// One worker process per target.
    MultiProcess(Arc<ProxiedBackend>),
}

impl Gateway {
    /// The backend facade behind either variant.
    pub fn backend(&self) -> Arc<dyn BuildBackend> {
        match self {
            Self::InProcess(backend) => Arc::clone(backend) as Arc<dyn BuildBackend>,
            Self::MultiProcess(backend) => Arc::clone(backend) as Arc<dyn BuildBackend>,
        }
    }

    /// Tracked workers. Always empty in-process.
    pub fn workers(&self) -> Vec<WorkerInfo> {
        match self {
            Self::InProcess(_) => Vec::new(),
            Self::MultiProcess(backend) => backend.workers(),
        }
    }

    /// Answer an asset request for `target`.
    pub async fn serve(&self, target: &Target, request: Request) -> Result<Response, HttpError> {
        match self {
            Self::InProcess(backend) => {
                let name = request.uri().path().trim_start_matches('/');
                if name.is_empty() {
                    return Err(HttpError::NotFound("No asset named".to_string()));
                }
                let asset = backend.get_asset(target, name).await?;
                Ok(asset_response(asset))
            }
            Self::MultiProcess(backend) => {
                let request = forward_request(request).await?;
                let response = backend.forward(target, request).await?;
                Ok(relay_response(response))
            }
        }
    }

    pub async fn shutdown(&self) {
        self.backend().shutdown().await;
    }
}

async fn forward_request(request: Request) -> Result<ForwardRequest, HttpError> {
    let (parts, body) = request.into_parts();
    let body = to_bytes(body, MAX_FORWARD_BODY)
        .await
        .map_err(|e| HttpError::BadRequest(format!("Failed to read request body: {e}")))?;
    let path_and_query = parts
        .uri
        .path_and_query()
        .map_or_else(|| parts.uri.path().to_string(), ToString::to_string);
    Ok(ForwardRequest {
        method: parts.method,
        path_and_query,
        headers: parts.headers,
        body,
    })
}

fn relay_response(response: ForwardResponse) -> Response {
    let mut builder = Response::builder().status(response.status);
    if let Some(headers) = builder.headers_mut() {
        headers.extend(response.headers);
    }
    builder
        .body(Body::from_stream(response.body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

/// Render a backend asset as a `200 OK` response.
pub fn asset_response(asset: Asset) -> Response {
    let mut builder = Response::builder().status(StatusCode::OK);
    if let Ok(value) = HeaderValue::from_str(&asset.mime_type) {
        builder = builder.header(header::CONTENT_TYPE, value);
    }
    if let Some(size) = asset.size {
        builder = builder.header(header::CONTENT_LENGTH, size);
    }
    let body = match asset.body {
        AssetBody::Bytes(bytes) => Body::from(bytes),
        AssetBody::Stream(stream) => Body::from_stream(stream),
    };
    builder
        .body(body)
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}
