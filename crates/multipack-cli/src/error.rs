//! CLI-specific error types and exit codes.

use multipack_core::ConfigurationError;
use thiserror::Error;

/// Errors surfaced at the binary boundary.
#[derive(Debug, Error)]
pub enum CliError {
    /// The configuration failed validation.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigurationError),

    /// The listening socket could not be opened.
    #[error("Failed to bind {addr}: {reason}")]
    Bind { addr: String, reason: String },
}

impl CliError {
    /// Map error to an exit code (see sysexits.h).
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) => 78, // EX_CONFIG
            Self::Bind { .. } => 69, // EX_UNAVAILABLE
        }
    }
}
