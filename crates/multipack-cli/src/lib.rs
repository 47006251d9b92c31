#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

// Used by the binary target only.
use dotenvy as _;
#[cfg(test)]
use reqwest as _;

pub mod bootstrap;
pub mod commands;
pub mod error;
pub mod handlers;
pub mod parser;

pub use bootstrap::{Reporters, build_reporters, init_tracing};
pub use commands::{Commands, StartArgs};
pub use error::CliError;
pub use parser::Cli;
