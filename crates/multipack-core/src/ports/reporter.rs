//! Reporter port: the append-only sink every component logs through.

use crate::log::LogEntry;

/// Sink for structured log entries.
///
/// Implementations must be thread-safe and must not block for long;
/// entries arrive from request handlers, worker output readers and build
/// state transitions concurrently.
pub trait Reporter: Send + Sync {
    /// Accept one entry.
    fn process(&self, entry: LogEntry);

    /// Flush buffered output.
    fn flush(&self);

    /// Flush and release resources. Entries processed afterwards are dropped.
    fn stop(&self);
}

/// Reporter that discards everything. Useful in tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl Reporter for NoopReporter {
    fn process(&self, _entry: LogEntry) {}

    fn flush(&self) {}

    fn stop(&self) {}
}
