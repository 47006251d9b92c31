//! Runtime services for multipack.
//!
//! Owns everything with a lifecycle: worker processes, bundler watchers,
//! per-target build state, live-update channels and the reporter pipeline.
//! HTTP surfaces live in `multipack-axum`; this crate only speaks HTTP as a
//! client when forwarding to workers.

#![deny(unsafe_code)]

pub mod backend;
pub mod build;
pub mod compiler;
pub mod logger;
pub mod process;
pub mod reporter;
pub mod symbolicate;

pub use backend::{BuildObserver, ForwardRequest, ForwardResponse, InProcessBackend, ProxiedBackend};
pub use build::{BuildTracker, UpdateChannels};
pub use compiler::CommandCompiler;
pub use logger::Logger;
pub use process::{EnsureOutcome, WorkerHandle, WorkerInfo, WorkerOrchestrator, WorkerStatus};
pub use reporter::{
    BroadcastReporter, ComposeReporter, ConsoleMode, ConsoleReporter, FileFormat, FileReporter,
    ReporterSink,
};
pub use symbolicate::Symbolicator;
