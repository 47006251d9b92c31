//! Logger handle passed explicitly into every component.
//!
//! There is no global reporter. The composition root builds one reporter
//! stack and hands each component a `Logger` carrying its issuer name.

use std::fmt;
use std::sync::Arc;

use multipack_core::{LogEntry, LogType, NoopReporter, Reporter};
use serde_json::Value;

/// Cheap cloneable handle to the shared reporter.
#[derive(Clone)]
pub struct Logger {
    reporter: Arc<dyn Reporter>,
    issuer: Arc<str>,
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger").field("issuer", &self.issuer).finish()
    }
}

impl Logger {
    /// Create a logger writing to `reporter` as `issuer`.
    pub fn new(reporter: Arc<dyn Reporter>, issuer: &str) -> Self {
        Self {
            reporter,
            issuer: Arc::from(issuer),
        }
    }

    /// Logger that drops everything.
    pub fn noop() -> Self {
        Self::new(Arc::new(NoopReporter), "noop")
    }

    /// Same reporter, different issuer.
    #[must_use]
    pub fn with_issuer(&self, issuer: &str) -> Self {
        Self {
            reporter: self.reporter.clone(),
            issuer: Arc::from(issuer),
        }
    }

    /// The issuer name stamped on entries.
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Underlying reporter.
    pub fn reporter(&self) -> &Arc<dyn Reporter> {
        &self.reporter
    }

    /// Forward a prebuilt entry.
    pub fn process(&self, entry: LogEntry) {
        self.reporter.process(entry);
    }

    /// Log a message with structured fields appended as a second part.
    pub fn log(&self, log_type: LogType, msg: &str, fields: Option<Value>) {
        let mut message = vec![Value::String(msg.to_string())];
        if let Some(fields) = fields {
            message.push(fields);
        }
        self.reporter
            .process(LogEntry::new(self.issuer.as_ref(), log_type, message));
    }

    pub fn debug(&self, msg: &str, fields: Option<Value>) {
        self.log(LogType::Debug, msg, fields);
    }

    pub fn info(&self, msg: &str, fields: Option<Value>) {
        self.log(LogType::Info, msg, fields);
    }

    pub fn warn(&self, msg: &str, fields: Option<Value>) {
        self.log(LogType::Warn, msg, fields);
    }

    pub fn error(&self, msg: &str, fields: Option<Value>) {
        self.log(LogType::Error, msg, fields);
    }
}
