//! CLI bootstrap - tracing and reporter composition.
//!
//! The reporter stack is assembled here and handed to the gateway; nothing
//! below the CLI decides where log entries end up.

use std::sync::Arc;

use multipack_core::{DevServerConfig, Reporter};
use multipack_runtime::{
    BroadcastReporter, ComposeReporter, ConsoleMode, ConsoleReporter, FileFormat, FileReporter,
    Logger, ReporterSink,
};
use tracing_subscriber::EnvFilter;

/// Initialise internal diagnostics on stderr. `RUST_LOG` overrides the
/// default `warn` filter.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .try_init();
}

/// The composed reporter and the sink behind `/api/events`.
pub struct Reporters {
    pub reporter: Arc<ComposeReporter>,
    pub events: Arc<BroadcastReporter>,
}

impl Reporters {
    pub fn logger(&self, issuer: &str) -> Logger {
        Logger::new(Arc::clone(&self.reporter) as Arc<dyn Reporter>, issuer)
    }

    /// Flush and close every sink.
    pub fn stop(&self) {
        self.reporter.stop();
    }
}

/// Console, optional log file and browser broadcast.
///
/// A log file that cannot be created is reported and skipped; the server
/// still starts with the remaining sinks.
pub fn build_reporters(config: &DevServerConfig) -> Reporters {
    let mode = if config.json {
        ConsoleMode::Json
    } else {
        ConsoleMode::Interactive
    };
    let events = Arc::new(BroadcastReporter::default());

    let mut reporter = ComposeReporter::new()
        .with_sink(Arc::new(ConsoleReporter::stdout(mode, config.verbosity)));
    if let Some(path) = &config.log_file {
        reporter = reporter.try_with_sink(
            FileReporter::create(path, FileFormat::Json)
                .map(|sink| Arc::new(sink) as Arc<dyn ReporterSink>),
        );
    }
    let reporter = reporter.with_sink(Arc::clone(&events) as Arc<dyn ReporterSink>);

    Reporters {
        reporter: Arc::new(reporter),
        events,
    }
}

/// Reporter of a worker process: `WorkerMessage::Log` lines on stdout.
pub fn build_worker_reporter(verbose: bool) -> Arc<ComposeReporter> {
    let verbosity = if verbose {
        multipack_core::Verbosity::Verbose
    } else {
        multipack_core::Verbosity::Normal
    };
    Arc::new(ComposeReporter::new().with_sink(Arc::new(ConsoleReporter::stdout(
        ConsoleMode::Worker,
        verbosity,
    ))))
}
