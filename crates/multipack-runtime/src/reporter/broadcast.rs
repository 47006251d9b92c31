//! Browser broadcast sink.
//!
//! Entries are pushed onto a `tokio::sync::broadcast` channel; the gateway
//! exposes receivers as a server-sent event stream. Slow receivers lag and
//! skip entries instead of blocking the pipeline.

use std::sync::atomic::{AtomicBool, Ordering};

use multipack_core::{LogEntry, ReporterSinkError};
use tokio::sync::broadcast;

use super::ReporterSink;

/// Channel capacity before lagging receivers start skipping entries.
pub const DEFAULT_BROADCAST_CAPACITY: usize = 256;

/// Sink that fans entries out to live browser connections.
#[derive(Debug)]
pub struct BroadcastReporter {
    sender: broadcast::Sender<LogEntry>,
    stopped: AtomicBool,
}

impl BroadcastReporter {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            stopped: AtomicBool::new(false),
        }
    }

    /// Receiver for a new connection. Only entries sent afterwards arrive.
    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.sender.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BroadcastReporter {
    fn default() -> Self {
        Self::new(DEFAULT_BROADCAST_CAPACITY)
    }
}

impl ReporterSink for BroadcastReporter {
    fn name(&self) -> &'static str {
        "broadcast"
    }

    fn write(&self, entry: &LogEntry) -> Result<(), ReporterSinkError> {
        if self.stopped.load(Ordering::Acquire) {
            return Ok(());
        }
        // No receivers is not a failure.
        let _ = self.sender.send(entry.clone());
        Ok(())
    }

    fn flush(&self) -> Result<(), ReporterSinkError> {
        Ok(())
    }

    fn stop(&self) -> Result<(), ReporterSinkError> {
        self.stopped.store(true, Ordering::Release);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use multipack_core::LogType;

    #[tokio::test]
    async fn test_subscribers_receive_entries() {
        let sink = BroadcastReporter::default();
        let mut rx = sink.subscribe();

        sink.write(&LogEntry::text("g", LogType::Info, "one")).unwrap();
        let got = rx.recv().await.unwrap();
        assert_eq!(got.plain_text(), "one");
    }

    #[test]
    fn test_write_without_receivers_is_ok() {
        let sink = BroadcastReporter::new(4);
        assert!(sink.write(&LogEntry::text("g", LogType::Info, "nobody")).is_ok());
        assert_eq!(sink.receiver_count(), 0);
    }

    #[tokio::test]
    async fn test_stopped_sink_sends_nothing() {
        let sink = BroadcastReporter::new(4);
        let mut rx = sink.subscribe();
        sink.stop().unwrap();
        sink.write(&LogEntry::text("g", LogType::Info, "late")).unwrap();
        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }
}
