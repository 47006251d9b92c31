//! Line protocol between the gateway and worker processes.
//!
//! Every line a worker writes to stdout or stderr is one JSON
//! [`WorkerMessage`]:
//!
//! ```json
//! {"kind":"log","timestamp":"…","issuer":"Compiler","type":"info","message":["…"]}
//! {"kind":"build","event":{"type":"started"}}
//! {"kind":"control","event":"build_started","target":"ios"}
//! ```

use serde::{Deserialize, Serialize};

use crate::build::BuildEvent;
use crate::log::LogEntry;
use crate::target::Target;

/// Out-of-band control message. There is exactly one: the worker's watch
/// loop has started, so it is ready to take requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ControlEvent {
    BuildStarted { target: Target },
}

/// One line of worker output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WorkerMessage {
    Log(LogEntry),
    Build { event: BuildEvent },
    Control(ControlEvent),
}

impl WorkerMessage {
    /// Parse one output line.
    pub fn parse_line(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }

    /// Serialise as a single line (no trailing newline).
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
