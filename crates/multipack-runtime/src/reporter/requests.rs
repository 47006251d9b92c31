//! Correlation of split request records.
//!
//! The HTTP layer logs a request twice: once when it arrives and once when
//! the response is sent. The console shows a single line per request, so the
//! start half is held back until its matching end arrives.

use std::collections::HashMap;

use multipack_core::LogEntry;
use multipack_core::log::{REQUEST_COMPLETED_MSG, REQUEST_STARTED_MSG};
use serde_json::Value;

/// Result of feeding one entry to the correlator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Correlation {
    /// Not a request record; render it as usual.
    Passthrough,
    /// Start half stored; render nothing yet.
    Pending,
    /// Both halves seen; render the combined line.
    Completed(CompletedRequest),
}

/// A request with both halves correlated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedRequest {
    pub method: String,
    pub url: String,
    pub status: u16,
    pub response_time_ms: Option<u64>,
}

impl CompletedRequest {
    /// `GET 200 /index.bundle (12ms)`
    pub fn render(&self) -> String {
        match self.response_time_ms {
            Some(ms) => format!("{} {} {} ({ms}ms)", self.method, self.status, self.url),
            None => format!("{} {} {}", self.method, self.status, self.url),
        }
    }
}

#[derive(Debug, Clone)]
struct PendingRequest {
    method: String,
    url: String,
}

/// Pairs request-start and request-end records by `reqId`.
#[derive(Debug, Default)]
pub struct RequestCorrelator {
    pending: HashMap<String, PendingRequest>,
}

impl RequestCorrelator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests started but not yet completed.
    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }

    pub fn correlate(&mut self, entry: &LogEntry) -> Correlation {
        let Some(record) = entry.message.first().filter(|part| part.is_object()) else {
            return Correlation::Passthrough;
        };
        let Some(req_id) = record.get("reqId").and_then(req_id_string) else {
            return Correlation::Passthrough;
        };

        match record.get("msg").and_then(Value::as_str) {
            Some(REQUEST_STARTED_MSG) => {
                let req = record.get("req");
                let field = |name: &str| {
                    req.and_then(|r| r.get(name))
                        .and_then(Value::as_str)
                        .unwrap_or("?")
                        .to_string()
                };
                self.pending.insert(
                    req_id,
                    PendingRequest {
                        method: field("method"),
                        url: field("url"),
                    },
                );
                Correlation::Pending
            }
            Some(REQUEST_COMPLETED_MSG) => {
                let started = self.pending.remove(&req_id).unwrap_or(PendingRequest {
                    method: "?".to_string(),
                    url: "?".to_string(),
                });
                let status = record
                    .get("res")
                    .and_then(|res| res.get("statusCode"))
                    .and_then(Value::as_u64)
                    .and_then(|code| u16::try_from(code).ok())
                    .unwrap_or(0);
                Correlation::Completed(CompletedRequest {
                    method: started.method,
                    url: started.url,
                    status,
                    response_time_ms: record.get("responseTime").and_then(Value::as_u64),
                })
            }
            _ => Correlation::Passthrough,
        }
    }
}

fn req_id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
