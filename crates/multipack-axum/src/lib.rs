//! Axum gateway for multipack.
//!
//! The single network-facing entry point: resolves the target of every
//! request, serves or forwards assets, and exposes symbolication, status,
//! live-update and control endpoints.

#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

// Silence unused dev-dependency warnings for test-only crates
#[cfg(test)]
use async_trait as _;
#[cfg(test)]
use bytes as _;
#[cfg(test)]
use http_body_util as _;
#[cfg(test)]
use tower as _;
#[cfg(test)]
use tokio_tungstenite as _;

pub mod bootstrap;
pub mod control;
pub mod dto;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;

// Re-export primary types
pub use bootstrap::{AxumContext, BootstrapDeps, bootstrap, in_process_backend, serve};
pub use error::HttpError;
pub use gateway::Gateway;
pub use routes::create_router;
pub use state::AppState;
