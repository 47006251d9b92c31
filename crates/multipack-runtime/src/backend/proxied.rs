//! Multi-process backend: one worker process per target.
//!
//! Every call resolves a ready worker through the orchestrator, spawning it
//! on first use, and is answered by that worker over HTTP. Build state is
//! read from the gateway tracker, which workers feed over their output.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::TryStreamExt;
use http::{Method, StatusCode, header};
use multipack_core::{
    Asset, AssetBody, BackendError, BuildBackend, BuildState, Target, mime_type_for,
};
use reqwest::{Client, Url};

use super::forward::{ForwardRequest, ForwardResponse, forward_to, timeout_error, unreachable_error};
use crate::build::BuildTracker;
use crate::process::{WorkerHandle, WorkerInfo, WorkerOrchestrator};

/// [`BuildBackend`] delegating to per-target worker processes.
#[derive(Debug)]
pub struct ProxiedBackend {
    targets: Vec<Target>,
    orchestrator: WorkerOrchestrator,
    client: Client,
    forward_timeout: Duration,
}

impl ProxiedBackend {
    pub fn new(
        targets: Vec<Target>,
        orchestrator: WorkerOrchestrator,
        forward_timeout: Duration,
    ) -> Result<Self, BackendError> {
        let client = Client::builder()
            .build()
            .map_err(|e| BackendError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self {
            targets,
            orchestrator,
            client,
            forward_timeout,
        })
    }

    pub fn orchestrator(&self) -> &WorkerOrchestrator {
        &self.orchestrator
    }

    pub fn tracker(&self) -> &Arc<BuildTracker> {
        self.orchestrator.tracker()
    }

    /// Tracked workers and their status.
    pub fn workers(&self) -> Vec<WorkerInfo> {
        self.orchestrator.workers()
    }

    fn check_target(&self, target: &Target) -> Result<(), BackendError> {
        if self.targets.contains(target) {
            Ok(())
        } else {
            Err(BackendError::UnknownTarget(target.to_string()))
        }
    }

    async fn worker(&self, target: &Target) -> Result<WorkerHandle, BackendError> {
        self.check_target(target)?;
        Ok(self.orchestrator.ensure_worker(target).await?.handle)
    }

    /// Pass `request` through to the worker of `target`, spawning it first
    /// when needed. The worker's response is relayed unchanged.
    pub async fn forward(
        &self,
        target: &Target,
        request: ForwardRequest,
    ) -> Result<ForwardResponse, BackendError> {
        let worker = self.worker(target).await?;
        Ok(forward_to(&self.client, &worker, request, self.forward_timeout).await?)
    }

    async fn fetch(&self, worker: &WorkerHandle, name: &str) -> Result<reqwest::Response, BackendError> {
        let mut url = Url::parse(&worker.base_url())
            .and_then(|base| base.join(name))
            .map_err(|e| BackendError::Internal(format!("worker URL for {name}: {e}")))?;
        url.query_pairs_mut()
            .append_pair("target", worker.target.as_str());

        let send = self.client.request(Method::GET, url).send();
        let response = tokio::time::timeout(self.forward_timeout, send)
            .await
            .map_err(|_| timeout_error(&worker.target, self.forward_timeout))?
            .map_err(|e| unreachable_error(&worker.target, &e))?;
        Ok(response)
    }
}

fn unexpected_status(target: &Target, name: &str, status: StatusCode) -> BackendError {
    BackendError::Internal(format!("{target} worker answered {status} for {name}"))
}

#[async_trait]
impl BuildBackend for ProxiedBackend {
    fn targets(&self) -> Vec<Target> {
        self.targets.clone()
    }

    async fn get_asset(&self, target: &Target, name: &str) -> Result<Asset, BackendError> {
        let worker = self.worker(target).await?;
        let response = self.fetch(&worker, name).await?;
        match response.status() {
            StatusCode::NOT_FOUND => {
                return Err(BackendError::AssetNotFound {
                    target: target.clone(),
                    name: name.to_string(),
                });
            }
            status if !status.is_success() => return Err(unexpected_status(target, name, status)),
            _ => {}
        }

        let mime_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map_or_else(|| mime_type_for(name), str::to_string);
        Ok(Asset {
            name: name.to_string(),
            mime_type,
            size: response.content_length(),
            body: AssetBody::Stream(Box::pin(
                response.bytes_stream().map_err(std::io::Error::other),
            )),
        })
    }

    async fn get_source_map(
        &self,
        target: &Target,
        name: &str,
    ) -> Result<Option<Bytes>, BackendError> {
        let worker = self.worker(target).await?;
        let map_name = format!("{name}.map");
        let response = self.fetch(&worker, &map_name).await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => response
                .bytes()
                .await
                .map(Some)
                .map_err(|e| unreachable_error(target, &e).into()),
            status => Err(unexpected_status(target, &map_name, status)),
        }
    }

    async fn get_build_state(&self, target: &Target) -> Result<BuildState, BackendError> {
        self.check_target(target)?;
        Ok(self.tracker().state(target))
    }

    async fn shutdown(&self) {
        self.orchestrator.shutdown().await;
    }
}
