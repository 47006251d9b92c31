//! Append-only file sink.
//!
//! The file is created fresh per run. Writes go through a
//! `tracing_appender` non-blocking writer so request handlers never wait on
//! disk; dropping the guard in `stop` flushes what is still queued.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use multipack_core::{LogEntry, LogType, ReporterSinkError};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};

use super::ReporterSink;

const SINK: &str = "file";

/// Line format of the file sink.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FileFormat {
    /// One JSON `LogEntry` per line.
    #[default]
    Json,
    /// `timestamp [type] issuer: text`
    Plain,
}

struct Writer {
    inner: NonBlocking,
    _guard: WorkerGuard,
}

/// Sink writing entries to a log file.
pub struct FileReporter {
    path: PathBuf,
    format: FileFormat,
    writer: Mutex<Option<Writer>>,
}

impl FileReporter {
    /// Create (or truncate) `path` and start the background writer.
    pub fn create(path: impl AsRef<Path>, format: FileFormat) -> Result<Self, ReporterSinkError> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).map_err(|source| ReporterSinkError::Io { sink: SINK, source })?;
        let (inner, guard) = tracing_appender::non_blocking(file);
        Ok(Self {
            path,
            format,
            writer: Mutex::new(Some(Writer {
                inner,
                _guard: guard,
            })),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn render(&self, entry: &LogEntry) -> Result<String, ReporterSinkError> {
        match self.format {
            FileFormat::Json => {
                serde_json::to_string(entry).map_err(|e| ReporterSinkError::Serialization {
                    sink: SINK,
                    reason: e.to_string(),
                })
            }
            FileFormat::Plain => Ok(format!(
                "{} [{}] {}: {}",
                entry.timestamp.to_rfc3339(),
                level_name(entry),
                entry.issuer,
                entry.plain_text()
            )),
        }
    }
}

fn level_name(entry: &LogEntry) -> &'static str {
    match entry.log_type {
        LogType::Debug => "debug",
        LogType::Info => "info",
        LogType::Warn => "warn",
        LogType::Error => "error",
    }
}

impl ReporterSink for FileReporter {
    fn name(&self) -> &'static str {
        SINK
    }

    fn write(&self, entry: &LogEntry) -> Result<(), ReporterSinkError> {
        let line = self.render(entry)?;
        let mut guard = self.writer.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let Some(writer) = guard.as_mut() else {
            return Ok(());
        };
        writeln!(writer.inner, "{line}").map_err(|source| ReporterSinkError::Io { sink: SINK, source })
    }

    fn flush(&self) -> Result<(), ReporterSinkError> {
        let mut guard = self.writer.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        match guard.as_mut() {
            Some(writer) => writer
                .inner
                .flush()
                .map_err(|source| ReporterSinkError::Io { sink: SINK, source }),
            None => Ok(()),
        }
    }

    fn stop(&self) -> Result<(), ReporterSinkError> {
        // Dropping the guard blocks until queued lines are on disk.
        let writer = self
            .writer
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();
        drop(writer);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_json_lines_written_after_stop() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("multipack.log");
        let sink = FileReporter::create(&path, FileFormat::Json).unwrap();

        sink.write(&LogEntry::text("Gateway", LogType::Info, "first")).unwrap();
        sink.write(&LogEntry::text("Gateway", LogType::Error, "second")).unwrap();
        sink.stop().unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        let parsed: LogEntry = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(parsed.log_type, LogType::Error);
        assert_eq!(parsed.plain_text(), "second");
    }

    #[test]
    fn test_plain_format() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("plain.log");
        let sink = FileReporter::create(&path, FileFormat::Plain).unwrap();
        sink.write(&LogEntry::text("Worker(ios)", LogType::Warn, "slow build")).unwrap();
        sink.stop().unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.trim_end().ends_with("[warn] Worker(ios): slow build"));
    }

    #[test]
    fn test_file_truncated_per_run() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run.log");
        std::fs::write(&path, "stale\n").unwrap();

        let sink = FileReporter::create(&path, FileFormat::Plain).unwrap();
        sink.stop().unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn test_unwritable_path_is_sink_error() {
        let err = FileReporter::create("/nonexistent-dir/for/sure/x.log", FileFormat::Json)
            .err()
            .unwrap();
        assert!(matches!(err, ReporterSinkError::Io { sink: "file", .. }));
    }

    #[test]
    fn test_writes_after_stop_are_dropped() {
        let dir = TempDir::new().unwrap();
        let sink = FileReporter::create(dir.path().join("x.log"), FileFormat::Json).unwrap();
        sink.stop().unwrap();
        assert!(sink.write(&LogEntry::text("g", LogType::Info, "late")).is_ok());
    }
}
