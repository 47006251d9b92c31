//! Core domain types and port definitions for multipack.
//!
//! This crate has no knowledge of processes, sockets or HTTP frameworks.
//! It defines the vocabulary shared by the runtime (orchestrator, build
//! tracking, symbolication, reporters) and the adapters (axum gateway, CLI).

#![deny(unused_crate_dependencies)]

pub mod asset;
pub mod build;
pub mod config;
pub mod error;
pub mod frame;
pub mod log;
pub mod ports;
pub mod protocol;
pub mod target;
pub mod update;

// Re-export commonly used types for convenience
pub use asset::{Asset, AssetBody, ByteStream, mime_type_for};
pub use build::{
    AssetSummary, BuildEvent, BuildOutcome, BuildPhase, BuildRecord, BuildState, Generation,
};
pub use config::{
    BackendMode, CompilerCommand, DevServerConfig, Verbosity, WorkerCommand, WorkerConfig,
    CONFIG_ENV_KEY, DEFAULT_HMR_PATH, DEFAULT_PORT, VERBOSE_ENV_KEY, WORKER_ENV_KEY,
    WORKER_HOST,
};
pub use error::{
    BackendError, CompilerError, ConfigurationError, ForwardError, ReporterSinkError,
    SymbolicationError, WorkerSpawnError,
};
pub use frame::{CodeFrame, StackFrame, SymbolicateRequest, SymbolicateResponse};
pub use log::{LogEntry, LogType, Progress};
pub use ports::{BuildBackend, Compiler, CompilerEvent, NoopReporter, Reporter};
pub use protocol::{ControlEvent, WorkerMessage};
pub use target::{Target, TargetResolver};
pub use update::{ConnectionId, UpdateAction, UpdateMessage};
