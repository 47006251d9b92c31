//! Build lifecycle types.
//!
//! Per target the lifecycle is
//! `idle → invalid → building → {built | errored} → invalid → …`.
//! Only the latest [`BuildRecord`] is ever retained.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::target::Target;

/// Monotonically increasing identifier of one compile run of a target.
///
/// The first build of a target is generation 1; `Generation::NONE` means no
/// build has started yet.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Generation(pub u64);

impl Generation {
    /// No build has started.
    pub const NONE: Self = Self(0);

    /// The generation following this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Build phase of a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildPhase {
    /// No build activity observed yet.
    Idle,
    /// Sources changed; a new build is expected.
    Invalid,
    /// A build is in flight.
    Building,
    /// The latest build finished without compile errors.
    Built,
    /// The latest build finished with compile errors.
    Errored,
}

impl BuildPhase {
    /// Whether the latest started build has finished.
    pub const fn is_settled(self) -> bool {
        matches!(self, Self::Built | Self::Errored)
    }
}

/// Name and size of one emitted asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetSummary {
    pub name: String,
    pub size: u64,
}

/// What the backend reports when a build finishes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildOutcome {
    /// Content hash of the compilation.
    pub hash: String,
    /// Wall time of the build.
    pub duration_ms: u64,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub assets: Vec<AssetSummary>,
}

impl BuildOutcome {
    /// Whether the build produced compile errors.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Summary of the latest completed build of a target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildRecord {
    pub target: Target,
    pub generation: Generation,
    pub hash: String,
    pub duration_ms: u64,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    pub assets: Vec<AssetSummary>,
}

impl BuildRecord {
    /// Build a record from a finished build.
    pub fn from_outcome(target: Target, generation: Generation, outcome: BuildOutcome) -> Self {
        Self {
            target,
            generation,
            hash: outcome.hash,
            duration_ms: outcome.duration_ms,
            warnings: outcome.warnings,
            errors: outcome.errors,
            assets: outcome.assets,
        }
    }

    /// Whether the recorded build failed to compile.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Read-only snapshot of a target's build state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildState {
    pub target: Target,
    pub phase: BuildPhase,
    /// Latest started generation.
    pub generation: Generation,
    /// Latest completed build.
    pub latest: Option<BuildRecord>,
}

impl BuildState {
    /// State of a target nothing has happened to yet.
    pub const fn idle(target: Target) -> Self {
        Self {
            target,
            phase: BuildPhase::Idle,
            generation: Generation::NONE,
            latest: None,
        }
    }

    /// Whether the latest started generation has settled.
    pub const fn is_settled(&self) -> bool {
        self.phase.is_settled()
    }
}

/// Build lifecycle event reported by a backend.
///
/// Workers relay these to the gateway; in-process backends apply them
/// directly to their tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BuildEvent {
    /// Watch started or a source file changed.
    Invalid {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        file: Option<String>,
    },
    /// The compiler began a build.
    Started,
    /// The build begun by the last `Started` finished.
    Finished { outcome: BuildOutcome },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_ordering() {
        assert!(Generation::NONE < Generation::NONE.next());
        assert_eq!(Generation(4).next(), Generation(5));
        assert_eq!(Generation(3).to_string(), "#3");
    }

    #[test]
    fn test_phase_settled() {
        assert!(BuildPhase::Built.is_settled());
        assert!(BuildPhase::Errored.is_settled());
        assert!(!BuildPhase::Building.is_settled());
        assert!(!BuildPhase::Invalid.is_settled());
        assert!(!BuildPhase::Idle.is_settled());
    }

    #[test]
    fn test_record_wire_format() {
        let record = BuildRecord::from_outcome(
            Target::new("ios").unwrap(),
            Generation(2),
            BuildOutcome {
                hash: "abc".into(),
                duration_ms: 120,
                ..Default::default()
            },
        );
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["target"], "ios");
        assert_eq!(json["generation"], 2);
        assert_eq!(json["durationMs"], 120);
        assert!(!record.has_errors());
    }

    #[test]
    fn test_build_event_tagging() {
        let event: BuildEvent =
            serde_json::from_str(r#"{"type":"finished","outcome":{"hash":"h","durationMs":5}}"#)
                .unwrap();
        match event {
            BuildEvent::Finished { outcome } => {
                assert_eq!(outcome.hash, "h");
                assert!(outcome.errors.is_empty());
            }
            other => panic!("Unexpected event: {other:?}"),
        }
    }
}
