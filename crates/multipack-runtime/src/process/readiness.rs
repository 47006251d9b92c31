//! Worker readiness state machine.
//!
//! A slot is `Starting` with a list of registered waiters until the worker's
//! control message arrives, then `Ready` with the handle. Every transition
//! happens under the orchestrator lock, so a waiter is either registered
//! before the transition (and resolved by it) or sees `Ready` directly.

use multipack_core::WorkerSpawnError;
use tokio::sync::oneshot;

use super::types::WorkerHandle;

/// One-shot answer to a waiting `ensure_worker` call.
pub type ReadyReceiver = oneshot::Receiver<Result<WorkerHandle, WorkerSpawnError>>;
type ReadySender = oneshot::Sender<Result<WorkerHandle, WorkerSpawnError>>;

/// What a caller gets when joining a slot.
#[derive(Debug)]
pub enum Join {
    Ready(WorkerHandle),
    Wait(ReadyReceiver),
}

/// Readiness of one target's worker.
#[derive(Debug)]
pub enum WorkerSlot {
    Starting { waiters: Vec<ReadySender> },
    Ready(WorkerHandle),
}

impl Default for WorkerSlot {
    fn default() -> Self {
        Self::Starting {
            waiters: Vec::new(),
        }
    }
}

impl WorkerSlot {
    /// A starting slot with one registered waiter.
    pub fn with_waiter() -> (Self, ReadyReceiver) {
        let (tx, rx) = oneshot::channel();
        (Self::Starting { waiters: vec![tx] }, rx)
    }

    pub const fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    pub const fn handle(&self) -> Option<&WorkerHandle> {
        match self {
            Self::Ready(handle) => Some(handle),
            Self::Starting { .. } => None,
        }
    }

    /// Register interest in the worker.
    pub fn join(&mut self) -> Join {
        match self {
            Self::Ready(handle) => Join::Ready(handle.clone()),
            Self::Starting { waiters } => {
                let (tx, rx) = oneshot::channel();
                waiters.push(tx);
                Join::Wait(rx)
            }
        }
    }

    /// Resolve every waiter with `handle`.
    ///
    /// Returns `false` if the slot was already ready; a repeated readiness
    /// signal is ignored.
    pub fn mark_ready(&mut self, handle: WorkerHandle) -> bool {
        if self.is_ready() {
            return false;
        }
        let Self::Starting { waiters } = std::mem::replace(self, Self::Ready(handle.clone()))
        else {
            return false;
        };
        for waiter in waiters {
            // A waiter whose caller went away is fine to skip.
            let _ = waiter.send(Ok(handle.clone()));
        }
        true
    }

    /// Reject every waiter with `error`. Consumes the slot.
    ///
    /// Returns the number of waiters rejected.
    pub fn fail(self, error: &WorkerSpawnError) -> usize {
        match self {
            Self::Starting { waiters } => {
                let count = waiters.len();
                for waiter in waiters {
                    let _ = waiter.send(Err(error.clone()));
                }
                count
            }
            Self::Ready(_) => 0,
        }
    }
}
