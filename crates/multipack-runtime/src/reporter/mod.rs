//! Reporter sinks and the fan-out aggregator.
//!
//! Every user-facing event flows through one [`ComposeReporter`] built by the
//! composition root. Each sink has its own flush/stop lifecycle and its own
//! failure scope: a sink that errors is logged via `tracing` and skipped for
//! that call only.

mod broadcast;
mod compose;
mod console;
mod file;
mod requests;
mod throttle;

pub use broadcast::{BroadcastReporter, DEFAULT_BROADCAST_CAPACITY};
pub use compose::ComposeReporter;
pub use console::{ConsoleMode, ConsoleReporter};
pub use file::{FileFormat, FileReporter};
pub use requests::{CompletedRequest, Correlation, RequestCorrelator};
pub use throttle::{DEFAULT_PROGRESS_INTERVAL, ProgressLimiter, ProgressThrottle};

use multipack_core::{LogEntry, ReporterSinkError};

/// A single output of the reporter pipeline.
#[cfg_attr(test, mockall::automock)]
pub trait ReporterSink: Send + Sync {
    /// Short name used in diagnostics.
    fn name(&self) -> &'static str;

    /// Write one entry.
    fn write(&self, entry: &LogEntry) -> Result<(), ReporterSinkError>;

    /// Flush buffered output.
    fn flush(&self) -> Result<(), ReporterSinkError>;

    /// Flush and release resources.
    fn stop(&self) -> Result<(), ReporterSinkError>;
}
