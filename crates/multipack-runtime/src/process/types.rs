//! Worker process types.

use std::fmt;

use multipack_core::{Target, WORKER_HOST};
use serde::{Deserialize, Serialize};

/// Address of a ready worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerHandle {
    pub target: Target,
    pub port: u16,
    pub pid: Option<u32>,
}

impl WorkerHandle {
    /// Base URL of the worker's HTTP server.
    pub fn base_url(&self) -> String {
        format!("http://{WORKER_HOST}:{}", self.port)
    }
}

impl fmt::Display for WorkerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} worker on port {}", self.target, self.port)
    }
}

/// Result of `ensure_worker`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnsureOutcome {
    pub handle: WorkerHandle,
    /// Whether this call started the process. Joining callers get `false`.
    pub spawned: bool,
}

/// Lifecycle status reported for a tracked worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerStatus {
    Starting,
    Ready,
}

/// Snapshot of one tracked worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerInfo {
    pub target: Target,
    pub status: WorkerStatus,
    pub port: Option<u16>,
}
