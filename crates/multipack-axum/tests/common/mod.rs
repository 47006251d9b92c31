//! Shared fixtures for gateway tests.

pub mod compiler;

use std::sync::Arc;

use multipack_axum::{AppState, AxumContext, Gateway};
use multipack_core::{CompilerCommand, DevServerConfig, Reporter, Target};
use multipack_runtime::{
    BroadcastReporter, BuildTracker, ComposeReporter, InProcessBackend, Logger, UpdateChannels,
};

use compiler::FakeCompiler;

pub fn targets() -> Vec<Target> {
    vec![Target::new("ios").unwrap(), Target::new("android").unwrap()]
}

pub fn test_config() -> DevServerConfig {
    DevServerConfig::new(
        targets(),
        "/nonexistent/bundler.config.js",
        CompilerCommand {
            program: "true".into(),
            args: vec![],
        },
    )
}

/// In-process gateway over [`FakeCompiler`], logging to `extra` as well as
/// the broadcast sink behind `/api/events`.
pub fn in_process_state(config: DevServerConfig, extra: Option<Arc<dyn Reporter>>) -> AppState {
    Arc::new(in_process_context(config, extra))
}

/// Unshared form of [`in_process_state`], for [`multipack_axum::serve`].
pub fn in_process_context(
    config: DevServerConfig,
    extra: Option<Arc<dyn Reporter>>,
) -> AxumContext {
    let events = Arc::new(BroadcastReporter::default());
    let reporter: Arc<dyn Reporter> = match extra {
        Some(extra) => Arc::new(Fanout(vec![
            Arc::new(ComposeReporter::new().with_sink(events.clone())),
            extra,
        ])),
        None => Arc::new(ComposeReporter::new().with_sink(events.clone())),
    };
    let logger = Logger::new(reporter, "Gateway");

    let channels = Arc::new(UpdateChannels::new());
    let tracker = Arc::new(BuildTracker::new(Arc::clone(&channels), logger.clone()));
    let backend = InProcessBackend::new(
        config.targets.clone(),
        Arc::new(FakeCompiler::with_bundle()),
        tracker,
        logger.clone(),
    );

    AxumContext::new(
        Arc::new(config),
        Gateway::InProcess(Arc::new(backend)),
        channels,
        events,
        logger,
    )
}

/// Reporter forwarding to several reporters.
struct Fanout(Vec<Arc<dyn Reporter>>);

impl Reporter for Fanout {
    fn process(&self, entry: multipack_core::LogEntry) {
        for reporter in &self.0 {
            reporter.process(entry.clone());
        }
    }

    fn flush(&self) {}

    fn stop(&self) {}
}
