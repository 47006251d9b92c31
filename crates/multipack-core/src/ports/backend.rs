//! Backend facade port.
//!
//! The gateway talks to build backends exclusively through this trait. Two
//! interchangeable implementations exist: an aggregated in-process backend
//! and a proxy over per-target worker processes. The implementation is chosen
//! once at startup.

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;

use crate::asset::Asset;
use crate::build::BuildState;
use crate::error::BackendError;
use crate::target::Target;

/// Capability interface over a build backend.
#[async_trait]
pub trait BuildBackend: Send + Sync + fmt::Debug {
    /// Targets this backend serves.
    fn targets(&self) -> Vec<Target>;

    /// Fetch an asset, waiting for the in-flight build of `target` to settle.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::AssetNotFound` when the settled build did not
    /// emit `name`.
    async fn get_asset(&self, target: &Target, name: &str) -> Result<Asset, BackendError>;

    /// Raw source map for the asset `name`, or `None` when none exists.
    async fn get_source_map(&self, target: &Target, name: &str)
    -> Result<Option<Bytes>, BackendError>;

    /// Snapshot of the target's build state. Never waits for a build.
    async fn get_build_state(&self, target: &Target) -> Result<BuildState, BackendError>;

    /// Release processes and background tasks.
    async fn shutdown(&self);
}
