//! Relay hub behind the `/message` control WebSocket.
//!
//! Every text frame a client sends is relayed to every other connected
//! client. `POST /reload` pushes a reload command to all of them.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;

/// Connected control clients.
#[derive(Debug, Default)]
pub struct ControlHub {
    clients: Mutex<HashMap<u64, mpsc::UnboundedSender<String>>>,
    next_id: AtomicU64,
}

impl ControlHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a client and return its id and outgoing queue.
    pub fn connect(&self) -> (u64, mpsc::UnboundedReceiver<String>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().insert(id, tx);
        (id, rx)
    }

    pub fn disconnect(&self, id: u64) {
        self.lock().remove(&id);
    }

    /// Send `text` to every client except `from`. Returns the number reached.
    pub fn relay(&self, from: u64, text: &str) -> usize {
        self.deliver(text, Some(from))
    }

    /// Send `text` to every client.
    pub fn broadcast(&self, text: &str) -> usize {
        self.deliver(text, None)
    }

    pub fn client_count(&self) -> usize {
        self.lock().len()
    }

    fn deliver(&self, text: &str, exclude: Option<u64>) -> usize {
        let mut clients = self.lock();
        clients.retain(|_, tx| !tx.is_closed());
        clients
            .iter()
            .filter(|(id, _)| Some(**id) != exclude)
            .filter(|(_, tx)| tx.send(text.to_string()).is_ok())
            .count()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<u64, mpsc::UnboundedSender<String>>> {
        self.clients.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
