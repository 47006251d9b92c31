//! External bundler port.
//!
//! Module resolution, transforms and packaging are the bundler's business.
//! This port only starts watch mode for a target and reads what it emitted.

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::build::AssetSummary;
use crate::error::CompilerError;
use crate::target::Target;

/// Event emitted by a bundler running in watch mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CompilerEvent {
    /// The watch loop started; the bundler is ready for requests.
    WatchRun,
    /// A source file changed.
    Invalid {
        #[serde(default)]
        file: Option<String>,
    },
    /// A compilation began.
    Compile,
    /// Compilation progress, `0.0..=1.0`.
    Progress {
        value: f64,
        #[serde(default)]
        label: String,
    },
    /// The compilation finished.
    Done {
        hash: String,
        /// Duration in milliseconds.
        time: u64,
        #[serde(default)]
        warnings: Vec<String>,
        #[serde(default)]
        errors: Vec<String>,
        #[serde(default)]
        assets: Vec<AssetSummary>,
    },
    /// Free-form bundler output.
    Log { level: String, message: String },
}

/// Port over the external bundler.
#[async_trait]
pub trait Compiler: Send + Sync + fmt::Debug {
    /// Start watch mode for `target`.
    ///
    /// Called again for a target only after its previous stream ended; events
    /// arrive in emission order.
    async fn watch(&self, target: &Target)
    -> Result<mpsc::UnboundedReceiver<CompilerEvent>, CompilerError>;

    /// Read an emitted artifact. `Ok(None)` when it does not exist.
    async fn read_asset(&self, target: &Target, name: &str) -> Result<Option<Bytes>, CompilerError>;

    /// Stop every watcher.
    async fn stop(&self);
}
