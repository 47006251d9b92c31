//! Error taxonomy.
//!
//! Each error type maps to one failure scope:
//!
//! - [`ConfigurationError`]: fatal at startup
//! - [`WorkerSpawnError`]: recoverable; a later request may retry the spawn
//! - [`ForwardError`]: request-scoped; the worker keeps running
//! - [`SymbolicationError`]: only when no target can be inferred at all
//! - [`ReporterSinkError`]: isolated to the failing sink

use std::path::PathBuf;

use thiserror::Error;

use crate::target::Target;

/// Invalid or unresolvable startup configuration.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// No targets were configured.
    #[error("No build targets configured")]
    NoTargets,

    /// A target name is not a valid identifier.
    #[error("Invalid target name: {0:?}")]
    InvalidTarget(String),

    /// The bundler configuration file does not exist or is unreadable.
    #[error("Build config not found: {}", .0.display())]
    BuildConfigNotFound(PathBuf),

    /// The bundler command is empty.
    #[error("Compiler command is empty")]
    EmptyCompilerCommand,

    /// A configured value is out of range or malformed.
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    /// Worker configuration could not be read from the environment.
    #[error("Worker environment error: {0}")]
    WorkerEnvironment(String),
}

/// A worker process could not be brought to readiness.
#[derive(Debug, Clone, Error)]
pub enum WorkerSpawnError {
    /// No ephemeral port could be allocated.
    #[error("No port available for {target} worker: {reason}")]
    PortUnavailable { target: Target, reason: String },

    /// The OS refused to start the process.
    #[error("Failed to start {target} worker: {reason}")]
    StartFailed { target: Target, reason: String },

    /// The process exited before signalling readiness.
    #[error("{target} worker exited before it was ready ({status})")]
    ExitedBeforeReady { target: Target, status: String },

    /// The orchestrator is shutting down.
    #[error("Orchestrator is shutting down")]
    ShuttingDown,
}

/// Forwarding a request to a worker failed.
#[derive(Debug, Error)]
pub enum ForwardError {
    /// The worker did not answer within the forwarding timeout.
    #[error("Worker for {target} timed out after {timeout_secs}s")]
    Timeout { target: Target, timeout_secs: u64 },

    /// The worker could not be reached or the connection broke.
    #[error("Worker for {target} is unreachable: {reason}")]
    Unreachable { target: Target, reason: String },

    /// The request could not be rebuilt for the worker.
    #[error("Invalid forwarded request: {0}")]
    InvalidRequest(String),
}

/// Symbolication failed for the whole batch.
#[derive(Debug, Error)]
pub enum SymbolicationError {
    /// No frame names a recognised target.
    #[error("Cannot infer target from stack frames")]
    UnknownTarget,
}

/// A reporter sink failed to accept an entry.
#[derive(Debug, Error)]
pub enum ReporterSinkError {
    #[error("I/O error in {sink} sink: {source}")]
    Io {
        sink: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error in {sink} sink: {reason}")]
    Serialization { sink: &'static str, reason: String },
}

/// Errors raised by the external bundler adapter.
#[derive(Debug, Error)]
pub enum CompilerError {
    /// The bundler process could not be started.
    #[error("Failed to start compiler for {target}: {reason}")]
    StartFailed { target: Target, reason: String },

    /// An emitted artifact could not be read.
    #[error("Failed to read {name} for {target}: {reason}")]
    ReadFailed {
        target: Target,
        name: String,
        reason: String,
    },

    /// The bundler's event stream ended while watching.
    #[error("Compiler for {target} exited")]
    Exited { target: Target },
}

/// Errors surfaced through the backend facade.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The target is not served by this backend.
    #[error("Unknown target: {0}")]
    UnknownTarget(String),

    /// No asset with that name exists for the target.
    #[error("Asset not found: {name} ({target})")]
    AssetNotFound { target: Target, name: String },

    /// The worker for the target could not be started.
    #[error(transparent)]
    Spawn(#[from] WorkerSpawnError),

    /// The worker could not be reached.
    #[error(transparent)]
    Forward(#[from] ForwardError),

    /// The bundler failed.
    #[error(transparent)]
    Compiler(#[from] CompilerError),

    /// The backend is shutting down.
    #[error("Backend is shutting down")]
    ShuttingDown,

    /// Unexpected condition.
    #[error("Internal error: {0}")]
    Internal(String),
}
