//! End-to-end reporter composition: console, file and live subscribers.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use multipack_core::{LogEntry, LogType, Reporter, Target, Verbosity};
use multipack_runtime::{
    BroadcastReporter, ComposeReporter, ConsoleMode, ConsoleReporter, FileFormat, FileReporter,
    Logger, ReporterSink,
};
use tempfile::TempDir;

#[derive(Clone, Default)]
struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn test_silent_console_still_writes_log_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("multipack.log");
    let console_out = SharedBuf::default();

    let reporter = ComposeReporter::new()
        .with_sink(Arc::new(ConsoleReporter::with_writer(
            ConsoleMode::Interactive,
            Verbosity::Silent,
            Box::new(console_out.clone()),
        )))
        .with_sink(Arc::new(
            FileReporter::create(&path, FileFormat::Json).unwrap(),
        ));
    let reporter: Arc<dyn Reporter> = Arc::new(reporter);
    let logger = Logger::new(Arc::clone(&reporter), "Gateway");

    logger.info("listening on 127.0.0.1:8081", None);
    logger.error("ios build failed", None);
    reporter.stop();

    assert!(console_out.0.lock().unwrap().is_empty());

    let contents = std::fs::read_to_string(&path).unwrap();
    let entries: Vec<LogEntry> = contents
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].issuer, "Gateway");
    assert_eq!(entries[1].log_type, LogType::Error);
}

#[test]
fn test_failed_file_sink_does_not_disable_console() {
    let dir = TempDir::new().unwrap();
    let console_out = SharedBuf::default();

    let reporter = ComposeReporter::new()
        .try_with_sink(
            FileReporter::create(dir.path().join("missing/dir/log"), FileFormat::Plain)
                .map(|sink| Arc::new(sink) as Arc<dyn ReporterSink>),
        )
        .with_sink(Arc::new(ConsoleReporter::with_writer(
            ConsoleMode::Json,
            Verbosity::Normal,
            Box::new(console_out.clone()),
        )));
    assert_eq!(reporter.len(), 1);

    reporter.process(LogEntry::text("Gateway", LogType::Info, "still here"));
    reporter.stop();

    let out = String::from_utf8(console_out.0.lock().unwrap().clone()).unwrap();
    assert!(out.contains("still here"));
}

#[tokio::test]
async fn test_live_subscribers_see_progress() {
    let broadcast = Arc::new(BroadcastReporter::default());
    let mut rx = broadcast.subscribe();
    let reporter = ComposeReporter::new().with_sink(broadcast);

    let ios = Target::new("ios").unwrap();
    reporter.process(LogEntry::progress("Compiler(ios)", &ios, 0.5, "building"));

    let entry = rx.recv().await.unwrap();
    let progress = entry.as_progress().unwrap();
    assert_eq!(progress.target, ios);
    assert_eq!(progress.percentage(), 50);
}
