//! Live-update messages pushed to connected clients.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::build::BuildRecord;
use crate::target::Target;

/// Identifier of one live client connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Kind of live update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateAction {
    /// Sent once on connect with the latest retained record.
    Sync,
    /// A build started.
    Building,
    /// A build finished (successfully or with errors in the body).
    Built,
}

/// Update pushed to live-update subscribers.
///
/// Wire format:
///
/// ```json
/// { "target": "ios", "action": "built", "body": { "hash": "…", … } }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateMessage {
    pub target: Target,
    pub action: UpdateAction,
    pub body: Option<BuildRecord>,
}

impl UpdateMessage {
    /// Sync message carrying the latest record (or `null`).
    pub const fn sync(target: Target, body: Option<BuildRecord>) -> Self {
        Self {
            target,
            action: UpdateAction::Sync,
            body,
        }
    }

    /// A build of `target` started.
    pub const fn building(target: Target) -> Self {
        Self {
            target,
            action: UpdateAction::Building,
            body: None,
        }
    }

    /// A build finished with `record`.
    pub fn built(record: BuildRecord) -> Self {
        Self {
            target: record.target.clone(),
            action: UpdateAction::Built,
            body: Some(record),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_null_body() {
        let msg = UpdateMessage::sync(Target::new("ios").unwrap(), None);
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"target":"ios","action":"sync","body":null}"#);
    }

    #[test]
    fn test_building_action() {
        let msg = UpdateMessage::building(Target::new("android").unwrap());
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["action"], "building");
        assert!(json["body"].is_null());
    }
}
