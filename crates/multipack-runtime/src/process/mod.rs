//! Worker process management.
//!
//! This module is organized into focused submodules:
//! - `orchestrator`: on-demand spawning and supervision of per-target workers
//! - `readiness`: the starting/ready state machine with its waiter list
//! - `ports`: ephemeral port allocation
//! - `shutdown`: SIGTERM → grace → SIGKILL teardown
//! - `stream`: lossy line readers over worker output

mod orchestrator;
mod ports;
mod readiness;
mod shutdown;
mod stream;
mod types;

pub use orchestrator::WorkerOrchestrator;
pub use ports::allocate_ephemeral_port;
pub use readiness::{Join, ReadyReceiver, WorkerSlot};
pub use shutdown::shutdown_child;
pub use stream::spawn_line_reader;
pub use types::{EnsureOutcome, WorkerHandle, WorkerInfo, WorkerStatus};
