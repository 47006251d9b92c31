//! Terminal sink.
//!
//! Three modes share one sink:
//!
//! - `Interactive`: coloured lines, correlated request records and one
//!   progress bar per target.
//! - `Json`: one `LogEntry` JSON object per line (`--json`).
//! - `Worker`: one `WorkerMessage::Log` line per entry, the wire format a
//!   worker process speaks to its gateway.

use std::collections::HashMap;
use std::fmt::Display;
use std::io::{self, Write};
use std::sync::Mutex;

use chrono::Local;
use console::{StyledObject, style};
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use multipack_core::{
    LogEntry, LogType, Progress, ReporterSinkError, Target, Verbosity, WorkerMessage,
};

use super::ReporterSink;
use super::requests::{Correlation, RequestCorrelator};
use super::throttle::ProgressLimiter;

const SINK: &str = "console";

/// Output format of the console sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleMode {
    Interactive,
    Json,
    Worker,
}

struct ProgressBars {
    multi: MultiProgress,
    bars: HashMap<Target, ProgressBar>,
}

impl ProgressBars {
    fn stderr() -> Self {
        Self {
            multi: MultiProgress::with_draw_target(ProgressDrawTarget::stderr()),
            bars: HashMap::new(),
        }
    }

    fn update(&mut self, progress: &Progress) {
        let multi = &self.multi;
        let bar = self.bars.entry(progress.target.clone()).or_insert_with(|| {
            let style = ProgressStyle::with_template(
                "{prefix:>10.bold} [{bar:30.cyan/blue}] {pos:>3}% {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");
            let bar = multi.add(ProgressBar::new(100));
            bar.set_style(style);
            bar.set_prefix(progress.target.to_string());
            bar
        });

        bar.set_position(progress.percentage());
        bar.set_message(progress.label.clone());
        if progress.value >= 1.0 {
            bar.finish_with_message("done");
            if let Some(done) = self.bars.remove(&progress.target) {
                self.multi.remove(&done);
            }
        }
    }

    fn clear(&mut self) {
        for (_, bar) in self.bars.drain() {
            bar.finish_and_clear();
        }
        let _ = self.multi.clear();
    }
}

struct ConsoleState {
    out: Box<dyn Write + Send>,
    requests: RequestCorrelator,
    limiter: ProgressLimiter,
    bars: Option<ProgressBars>,
    stopped: bool,
}

impl ConsoleState {
    fn emit(&mut self, line: &str) -> io::Result<()> {
        let Self { out, bars, .. } = self;
        match bars {
            Some(bars) => bars.multi.suspend(|| writeln!(out, "{line}")),
            None => writeln!(out, "{line}"),
        }
    }
}

/// Sink printing entries to the terminal.
pub struct ConsoleReporter {
    mode: ConsoleMode,
    verbosity: Verbosity,
    colors: bool,
    state: Mutex<ConsoleState>,
}

impl ConsoleReporter {
    /// Console on stdout. Progress bars are drawn on stderr when it is a terminal.
    pub fn stdout(mode: ConsoleMode, verbosity: Verbosity) -> Self {
        let term = console::Term::stdout();
        let interactive = mode == ConsoleMode::Interactive && term.is_term();
        let bars = interactive.then(ProgressBars::stderr);
        Self::build(
            mode,
            verbosity,
            interactive && term.features().colors_supported(),
            Box::new(io::stdout()),
            bars,
        )
    }

    /// Console writing into `writer`, without colours or progress bars.
    pub fn with_writer(
        mode: ConsoleMode,
        verbosity: Verbosity,
        writer: Box<dyn Write + Send>,
    ) -> Self {
        Self::build(mode, verbosity, false, writer, None)
    }

    fn build(
        mode: ConsoleMode,
        verbosity: Verbosity,
        colors: bool,
        out: Box<dyn Write + Send>,
        bars: Option<ProgressBars>,
    ) -> Self {
        Self {
            mode,
            verbosity,
            colors,
            state: Mutex::new(ConsoleState {
                out,
                requests: RequestCorrelator::new(),
                limiter: ProgressLimiter::default(),
                bars,
                stopped: false,
            }),
        }
    }

    pub const fn mode(&self) -> ConsoleMode {
        self.mode
    }

    fn visible(&self, entry: &LogEntry) -> bool {
        match (self.mode, self.verbosity) {
            // The gateway applies its own verbosity to worker output.
            (ConsoleMode::Worker, Verbosity::Verbose) => true,
            (ConsoleMode::Worker, _) => entry.log_type != LogType::Debug,
            (_, Verbosity::Silent) => false,
            (_, Verbosity::Normal) => entry.log_type != LogType::Debug,
            (_, Verbosity::Verbose) => true,
        }
    }

    fn paint<D: Display>(&self, object: StyledObject<D>) -> StyledObject<D> {
        object.force_styling(self.colors)
    }

    fn level_tag(&self, log_type: LogType) -> String {
        let tag = match log_type {
            LogType::Debug => self.paint(style(" debug ").dim()),
            LogType::Info => self.paint(style(" info ").cyan()),
            LogType::Warn => self.paint(style(" warn ").yellow()),
            LogType::Error => self.paint(style(" error ").red().bold()),
        };
        tag.to_string()
    }

    fn render_line(&self, entry: &LogEntry, text: &str) -> String {
        let time = entry.timestamp.with_timezone(&Local).format("%H:%M:%S");
        format!(
            "{} {} {} {}",
            self.paint(style(time).dim()),
            self.level_tag(entry.log_type),
            self.paint(style(&entry.issuer).bold()),
            text
        )
    }

    fn write_interactive(
        &self,
        state: &mut ConsoleState,
        entry: &LogEntry,
    ) -> Result<(), ReporterSinkError> {
        if let Some(progress) = entry.as_progress() {
            if !state.limiter.admit(&progress) {
                return Ok(());
            }
            if let Some(bars) = state.bars.as_mut() {
                bars.update(&progress);
                return Ok(());
            }
            let text = format!(
                "{} {:>3}% {}",
                progress.target,
                progress.percentage(),
                progress.label
            );
            return state.emit(&self.render_line(entry, &text)).map_err(io_error);
        }

        match state.requests.correlate(entry) {
            Correlation::Pending => Ok(()),
            Correlation::Completed(request) => {
                let rendered = request.render();
                let text = if request.status >= 400 {
                    self.paint(style(rendered).red()).to_string()
                } else {
                    self.paint(style(rendered).green()).to_string()
                };
                state.emit(&self.render_line(entry, &text)).map_err(io_error)
            }
            Correlation::Passthrough => state
                .emit(&self.render_line(entry, &entry.plain_text()))
                .map_err(io_error),
        }
    }
}

fn io_error(source: io::Error) -> ReporterSinkError {
    ReporterSinkError::Io { sink: SINK, source }
}

fn serialization_error(e: &serde_json::Error) -> ReporterSinkError {
    ReporterSinkError::Serialization {
        sink: SINK,
        reason: e.to_string(),
    }
}

impl ReporterSink for ConsoleReporter {
    fn name(&self) -> &'static str {
        SINK
    }

    fn write(&self, entry: &LogEntry) -> Result<(), ReporterSinkError> {
        if !self.visible(entry) {
            return Ok(());
        }
        let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if state.stopped {
            return Ok(());
        }

        match self.mode {
            ConsoleMode::Interactive => self.write_interactive(&mut state, entry),
            ConsoleMode::Json => {
                let line = serde_json::to_string(entry).map_err(|e| serialization_error(&e))?;
                state.emit(&line).map_err(io_error)
            }
            ConsoleMode::Worker => {
                let line = WorkerMessage::Log(entry.clone())
                    .to_line()
                    .map_err(|e| serialization_error(&e))?;
                // Workers are read line by line; flush every message.
                state.emit(&line).map_err(io_error)?;
                state.out.flush().map_err(io_error)
            }
        }
    }

    fn flush(&self) -> Result<(), ReporterSinkError> {
        let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        state.out.flush().map_err(io_error)
    }

    fn stop(&self) -> Result<(), ReporterSinkError> {
        let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        state.stopped = true;
        if let Some(bars) = state.bars.as_mut() {
            bars.clear();
        }
        state.out.flush().map_err(io_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

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

    impl SharedBuf {
        fn lines(&self) -> Vec<String> {
            String::from_utf8(self.0.lock().unwrap().clone())
                .unwrap()
                .lines()
                .map(str::to_string)
                .collect()
        }
    }

    fn console(mode: ConsoleMode, verbosity: Verbosity) -> (ConsoleReporter, SharedBuf) {
        let buf = SharedBuf::default();
        let reporter = ConsoleReporter::with_writer(mode, verbosity, Box::new(buf.clone()));
        (reporter, buf)
    }

    #[test]
    fn test_silent_emits_nothing() {
        let (reporter, buf) = console(ConsoleMode::Interactive, Verbosity::Silent);
        reporter.write(&LogEntry::text("g", LogType::Error, "boom")).unwrap();
        reporter.write(&LogEntry::text("g", LogType::Info, "hi")).unwrap();
        assert!(buf.lines().is_empty());
    }

    #[test]
    fn test_normal_hides_debug() {
        let (reporter, buf) = console(ConsoleMode::Interactive, Verbosity::Normal);
        reporter.write(&LogEntry::text("g", LogType::Debug, "noise")).unwrap();
        reporter.write(&LogEntry::text("Gateway", LogType::Info, "listening")).unwrap();

        let lines = buf.lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("Gateway"));
        assert!(lines[0].ends_with("listening"));
    }

    #[test]
    fn test_request_records_render_once() {
        let (reporter, buf) = console(ConsoleMode::Interactive, Verbosity::Normal);
        reporter
            .write(&LogEntry::request_started("Gateway", "r1", "GET", "/index.bundle"))
            .unwrap();
        assert!(buf.lines().is_empty());

        reporter
            .write(&LogEntry::request_completed("Gateway", "r1", 200, 7))
            .unwrap();
        let lines = buf.lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("GET 200 /index.bundle (7ms)"));
    }

    #[test]
    fn test_progress_boundaries_always_printed() {
        let (reporter, buf) = console(ConsoleMode::Interactive, Verbosity::Normal);
        let ios = Target::new("ios").unwrap();
        reporter.write(&LogEntry::progress("Compiler", &ios, 0.0, "start")).unwrap();
        reporter.write(&LogEntry::progress("Compiler", &ios, 0.4, "mid")).unwrap();
        reporter.write(&LogEntry::progress("Compiler", &ios, 0.5, "mid")).unwrap();
        reporter.write(&LogEntry::progress("Compiler", &ios, 1.0, "end")).unwrap();

        let lines = buf.lines();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("ios   0% start"));
        assert!(lines[1].contains("ios 100% end"));
    }

    #[test]
    fn test_worker_mode_speaks_wire_protocol() {
        let (reporter, buf) = console(ConsoleMode::Worker, Verbosity::Silent);
        reporter.write(&LogEntry::text("Compiler", LogType::Warn, "slow")).unwrap();

        let lines = buf.lines();
        assert_eq!(lines.len(), 1);
        let WorkerMessage::Log(entry) = WorkerMessage::parse_line(&lines[0]).unwrap() else {
            panic!("expected a log message");
        };
        assert_eq!(entry.plain_text(), "slow");
    }

    #[test]
    fn test_json_mode_one_object_per_line() {
        let (reporter, buf) = console(ConsoleMode::Json, Verbosity::Verbose);
        reporter.write(&LogEntry::text("g", LogType::Debug, "d")).unwrap();
        let lines = buf.lines();
        assert_eq!(lines.len(), 1);
        let parsed: LogEntry = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(parsed.log_type, LogType::Debug);
    }

    #[test]
    fn test_stopped_console_drops_entries() {
        let (reporter, buf) = console(ConsoleMode::Interactive, Verbosity::Normal);
        reporter.stop().unwrap();
        reporter.write(&LogEntry::text("g", LogType::Info, "late")).unwrap();
        assert!(buf.lines().is_empty());
    }
}
