//! Request and response shapes of the HTTP API.

use multipack_core::{BuildPhase, Generation, Target};
use multipack_runtime::WorkerStatus;
use serde::{Deserialize, Serialize};

/// Query parameters that may name a target. `platform` is the legacy name.
#[derive(Debug, Default, Deserialize)]
pub struct TargetQuery {
    pub target: Option<String>,
    pub platform: Option<String>,
}

impl TargetQuery {
    /// The explicitly requested target name, if any.
    pub fn explicit(&self) -> Option<&str> {
        self.target.as_deref().or(self.platform.as_deref())
    }
}

/// One entry of `GET /api/targets`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetSummary {
    pub name: Target,
    pub phase: BuildPhase,
    pub generation: Generation,
    /// Present in multi-process mode once a worker was requested.
    pub worker: Option<WorkerSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerSummary {
    pub status: WorkerStatus,
    pub port: Option<u16>,
}
