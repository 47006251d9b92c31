//! Fan-out of log entries to every configured sink.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use multipack_core::{LogEntry, Reporter, ReporterSinkError};
use tracing::warn;

use super::ReporterSink;

/// Reporter that forwards every entry to all of its sinks.
#[derive(Default)]
pub struct ComposeReporter {
    sinks: Vec<Arc<dyn ReporterSink>>,
    stopped: AtomicBool,
}

impl ComposeReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sink.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn ReporterSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Add a sink whose construction may have failed.
    ///
    /// A failed sink is reported and left out; the remaining sinks keep working.
    #[must_use]
    pub fn try_with_sink(
        mut self,
        sink: Result<Arc<dyn ReporterSink>, ReporterSinkError>,
    ) -> Self {
        match sink {
            Ok(sink) => self.sinks.push(sink),
            Err(e) => warn!(error = %e, "Reporter sink disabled"),
        }
        self
    }

    /// Number of active sinks.
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    fn each(&self, op: &str, f: impl Fn(&dyn ReporterSink) -> Result<(), ReporterSinkError>) {
        for sink in &self.sinks {
            if let Err(e) = f(sink.as_ref()) {
                warn!(sink = sink.name(), op, error = %e, "Reporter sink failed");
            }
        }
    }
}

impl Reporter for ComposeReporter {
    fn process(&self, entry: LogEntry) {
        if self.stopped.load(Ordering::Acquire) {
            return;
        }
        self.each("write", |sink| sink.write(&entry));
    }

    fn flush(&self) {
        self.each("flush", |sink| sink.flush());
    }

    fn stop(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        self.each("stop", |sink| sink.stop());
    }
}
