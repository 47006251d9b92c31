//! Live-update subscriber sets keyed by target.
//!
//! Every subscriber gets its own unbounded queue. Registration, the initial
//! `sync` and every broadcast run under the same lock, so a subscriber sees
//! its sync before any broadcast and each broadcast at most once.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use multipack_core::{BuildRecord, ConnectionId, Target, UpdateAction, UpdateMessage};
use tokio::sync::mpsc;
use tracing::debug;

#[derive(Default)]
struct TargetChannel {
    latest: Option<BuildRecord>,
    subscribers: HashMap<ConnectionId, mpsc::UnboundedSender<UpdateMessage>>,
}

impl TargetChannel {
    fn deliver(&mut self, msg: &UpdateMessage, exclude: &[ConnectionId]) -> usize {
        let mut delivered = 0;
        self.subscribers.retain(|id, tx| {
            if exclude.contains(id) {
                return true;
            }
            if tx.send(msg.clone()).is_ok() {
                delivered += 1;
                true
            } else {
                debug!(connection = %id, "Dropping closed update subscriber");
                false
            }
        });
        delivered
    }
}

/// Update Channel Manager.
#[derive(Default)]
pub struct UpdateChannels {
    targets: Mutex<HashMap<Target, TargetChannel>>,
    next_id: AtomicU64,
}

impl UpdateChannels {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh connection id.
    pub fn next_connection_id(&self) -> ConnectionId {
        ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// Register `connection` for `target` and queue its `sync` message.
    ///
    /// Re-subscribing an existing connection replaces its queue.
    pub fn subscribe(
        &self,
        target: &Target,
        connection: ConnectionId,
    ) -> mpsc::UnboundedReceiver<UpdateMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut targets = self.lock();
        let channel = targets.entry(target.clone()).or_default();
        // The receiver is alive, so this cannot fail.
        let _ = tx.send(UpdateMessage::sync(target.clone(), channel.latest.clone()));
        channel.subscribers.insert(connection, tx);
        rx
    }

    /// Remove a subscriber. Returns whether it was registered.
    pub fn unsubscribe(&self, target: &Target, connection: ConnectionId) -> bool {
        self.lock()
            .get_mut(target)
            .is_some_and(|channel| channel.subscribers.remove(&connection).is_some())
    }

    /// Deliver `msg` to every subscriber of `target` except `exclude`.
    ///
    /// Returns the number of subscribers reached.
    pub fn broadcast(
        &self,
        target: &Target,
        msg: &UpdateMessage,
        exclude: &[ConnectionId],
    ) -> usize {
        self.lock()
            .get_mut(target)
            .map_or(0, |channel| channel.deliver(msg, exclude))
    }

    /// Broadcast a tracker transition and remember built records for later syncs.
    pub(crate) fn publish(&self, msg: &UpdateMessage) -> usize {
        let mut targets = self.lock();
        let channel = targets.entry(msg.target.clone()).or_default();
        if msg.action == UpdateAction::Built {
            channel.latest.clone_from(&msg.body);
        }
        channel.deliver(msg, &[])
    }

    /// Current number of subscribers for `target`.
    pub fn subscriber_count(&self, target: &Target) -> usize {
        self.lock()
            .get(target)
            .map_or(0, |channel| channel.subscribers.len())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Target, TargetChannel>> {
        self.targets
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
