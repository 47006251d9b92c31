//! HTTP handlers.
//!
//! Handlers are thin: they resolve the target, call into the gateway or a
//! runtime service and map errors through [`HttpError`](crate::HttpError).

pub mod api;
pub mod assets;
pub mod events;
pub mod hmr;
pub mod message;
pub mod status;
pub mod symbolicate;
