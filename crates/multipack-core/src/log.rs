//! Structured log records flowing through the reporter pipeline.
//!
//! A [`LogEntry`] carries a list of message parts. Parts are plain JSON
//! values: strings and numbers are rendered inline, objects carry structured
//! payloads. Three object shapes are recognised by reporters:
//!
//! - `{"progress": {"target", "value", "label"}}`: build progress
//! - `{"msg": "incoming request", "reqId", "req": {"method", "url"}}`
//! - `{"msg": "request completed", "reqId", "res": {"statusCode"}}`

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::target::Target;

/// Marker of the request-start half of a request record pair.
pub const REQUEST_STARTED_MSG: &str = "incoming request";
/// Marker of the request-end half of a request record pair.
pub const REQUEST_COMPLETED_MSG: &str = "request completed";

/// Severity of a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogType {
    Debug,
    Info,
    Warn,
    Error,
}

/// A single structured log record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub issuer: String,
    #[serde(rename = "type")]
    pub log_type: LogType,
    pub message: Vec<Value>,
}

impl LogEntry {
    /// Create an entry stamped with the current time.
    pub fn new(issuer: impl Into<String>, log_type: LogType, message: Vec<Value>) -> Self {
        Self {
            timestamp: Utc::now(),
            issuer: issuer.into(),
            log_type,
            message,
        }
    }

    /// Single text message.
    pub fn text(issuer: impl Into<String>, log_type: LogType, text: impl Into<String>) -> Self {
        Self::new(issuer, log_type, vec![Value::String(text.into())])
    }

    /// Build progress of `target`; `value` is clamped to `0.0..=1.0`.
    pub fn progress(issuer: impl Into<String>, target: &Target, value: f64, label: &str) -> Self {
        let value = value.clamp(0.0, 1.0);
        Self::new(
            issuer,
            LogType::Info,
            vec![json!({ "progress": { "target": target, "value": value, "label": label } })],
        )
    }

    /// Request-start half of a request record pair.
    pub fn request_started(issuer: impl Into<String>, req_id: &str, method: &str, url: &str) -> Self {
        Self::new(
            issuer,
            LogType::Info,
            vec![json!({
                "msg": REQUEST_STARTED_MSG,
                "reqId": req_id,
                "req": { "method": method, "url": url },
            })],
        )
    }

    /// Request-end half of a request record pair.
    pub fn request_completed(
        issuer: impl Into<String>,
        req_id: &str,
        status_code: u16,
        response_time_ms: u64,
    ) -> Self {
        Self::new(
            issuer,
            LogType::Info,
            vec![json!({
                "msg": REQUEST_COMPLETED_MSG,
                "reqId": req_id,
                "res": { "statusCode": status_code },
                "responseTime": response_time_ms,
            })],
        )
    }

    /// Progress payload, if this entry is a progress record.
    pub fn as_progress(&self) -> Option<Progress> {
        let first = self.message.first()?;
        let progress = first.get("progress")?;
        serde_json::from_value(progress.clone()).ok()
    }

    /// Plain-text rendering of the message parts, used by file and JSON-less sinks.
    pub fn plain_text(&self) -> String {
        self.message
            .iter()
            .map(|part| match part {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Build progress payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    pub target: Target,
    pub value: f64,
    #[serde(default)]
    pub label: String,
}

impl Progress {
    /// Start and end of a build are never rate limited.
    pub fn is_boundary(&self) -> bool {
        self.value <= 0.0 || self.value >= 1.0
    }

    /// Whole percent, `0..=100`.
    pub fn percentage(&self) -> u64 {
        // value is clamped to 0.0..=1.0 at construction
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let pct = (self.value.clamp(0.0, 1.0) * 100.0).floor() as u64;
        pct
    }
}
