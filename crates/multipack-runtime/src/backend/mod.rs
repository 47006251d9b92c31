//! [`BuildBackend`](multipack_core::BuildBackend) implementations.
//!
//! - `in_process`: every target compiles in this process
//! - `proxied`: one worker process per target, reached over HTTP
//! - `forward`: transparent request pass-through to workers

mod forward;
mod in_process;
mod proxied;

pub use forward::{ForwardRequest, ForwardResponse, forward_to, should_forward_header, should_relay_header};
pub use in_process::{BuildObserver, InProcessBackend};
pub use proxied::ProxiedBackend;
