//! Build State Tracker.
//!
//! Per-target state machine:
//! `idle → invalid → building → {built | errored} → invalid → …`.
//!
//! Each `begin` starts a new generation. A completion is accepted only for
//! the generation currently building; a superseded build finishing late is
//! dropped, so callers waiting on a target always observe the newest build.
//!
//! Transitions are published to the [`UpdateChannels`] while the tracker lock
//! is held. Lock order is tracker, then channels.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use multipack_core::{
    BuildEvent, BuildOutcome, BuildPhase, BuildRecord, BuildState, Generation, Target,
    UpdateMessage,
};
use serde_json::json;
use tokio::sync::watch;
use tracing::debug;

use super::channels::UpdateChannels;
use crate::logger::Logger;

/// Tracks the build lifecycle of every target.
pub struct BuildTracker {
    states: Mutex<HashMap<Target, watch::Sender<BuildState>>>,
    channels: Arc<UpdateChannels>,
    logger: Logger,
    log_outcomes: bool,
}

impl BuildTracker {
    pub fn new(channels: Arc<UpdateChannels>, logger: Logger) -> Self {
        Self {
            states: Mutex::new(HashMap::new()),
            channels,
            logger,
            log_outcomes: true,
        }
    }

    /// Whether finished builds are reported through the logger.
    ///
    /// Off in worker processes, whose outcomes the gateway reports.
    #[must_use]
    pub fn with_outcome_logging(mut self, enabled: bool) -> Self {
        self.log_outcomes = enabled;
        self
    }

    /// Update channels this tracker publishes to.
    pub fn channels(&self) -> &Arc<UpdateChannels> {
        &self.channels
    }

    /// Snapshot of `target`'s state. Unknown targets are idle.
    pub fn state(&self, target: &Target) -> BuildState {
        self.lock()
            .get(target)
            .map_or_else(|| BuildState::idle(target.clone()), |tx| tx.borrow().clone())
    }

    /// Latest retained record, if any build finished.
    pub fn latest(&self, target: &Target) -> Option<BuildRecord> {
        self.state(target).latest
    }

    /// Watch `target`'s state.
    pub fn watch(&self, target: &Target) -> watch::Receiver<BuildState> {
        let mut states = self.lock();
        entry(&mut states, target).subscribe()
    }

    /// Wait until the current build of `target` settles.
    ///
    /// Returns immediately when the target is already built or errored.
    pub async fn wait_settled(&self, target: &Target) -> BuildState {
        let mut rx = self.watch(target);
        let settled = match rx.wait_for(BuildState::is_settled).await {
            Ok(state) => Some(state.clone()),
            Err(_) => None,
        };
        settled.unwrap_or_else(|| self.state(target))
    }

    /// A watch run started or a source file changed.
    pub fn invalidate(&self, target: &Target, file: Option<&str>) {
        let mut states = self.lock();
        entry(&mut states, target).send_modify(|state| state.phase = BuildPhase::Invalid);
        debug!(target = %target, file = ?file, "Build invalidated");
    }

    /// A build started. Returns its generation.
    pub fn begin(&self, target: &Target) -> Generation {
        let mut states = self.lock();
        let tx = entry(&mut states, target);
        let mut generation = Generation::NONE;
        tx.send_modify(|state| {
            state.generation = state.generation.next();
            state.phase = BuildPhase::Building;
            generation = state.generation;
        });
        self.channels.publish(&UpdateMessage::building(target.clone()));
        debug!(target = %target, generation = %generation, "Build started");
        generation
    }

    /// A build finished.
    ///
    /// Returns the recorded build, or `None` when `generation` was superseded.
    pub fn finish(
        &self,
        target: &Target,
        generation: Generation,
        outcome: BuildOutcome,
    ) -> Option<BuildRecord> {
        let mut states = self.lock();
        let tx = entry(&mut states, target);
        let (current, phase) = {
            let state = tx.borrow();
            (state.generation, state.phase)
        };
        if generation != current || phase != BuildPhase::Building {
            debug!(
                target = %target,
                generation = %generation,
                current = %current,
                "Dropping superseded build result"
            );
            return None;
        }

        let record = BuildRecord::from_outcome(target.clone(), generation, outcome);
        let phase = if record.has_errors() {
            BuildPhase::Errored
        } else {
            BuildPhase::Built
        };
        tx.send_modify(|state| {
            state.phase = phase;
            state.latest = Some(record.clone());
        });
        self.channels.publish(&UpdateMessage::built(record.clone()));
        drop(states);

        if self.log_outcomes {
            self.log_outcome(&record);
        }
        Some(record)
    }

    /// Finish whatever generation is currently building.
    pub fn finish_current(&self, target: &Target, outcome: BuildOutcome) -> Option<BuildRecord> {
        let generation = self.state(target).generation;
        self.finish(target, generation, outcome)
    }

    /// Apply a lifecycle event reported by a worker process.
    pub fn apply(&self, target: &Target, event: BuildEvent) {
        match event {
            BuildEvent::Invalid { file } => self.invalidate(target, file.as_deref()),
            BuildEvent::Started => {
                self.begin(target);
            }
            BuildEvent::Finished { outcome } => {
                self.finish_current(target, outcome);
            }
        }
    }

    fn log_outcome(&self, record: &BuildRecord) {
        let fields = json!({
            "target": record.target,
            "generation": record.generation,
            "hash": record.hash,
            "durationMs": record.duration_ms,
        });
        if record.has_errors() {
            self.logger.error(
                &format!(
                    "{} build failed with {} error(s)",
                    record.target,
                    record.errors.len()
                ),
                Some(fields),
            );
            for error in &record.errors {
                self.logger.error(error, None);
            }
        } else {
            self.logger.info(
                &format!("{} built in {}ms", record.target, record.duration_ms),
                Some(fields),
            );
        }
        for warning in &record.warnings {
            self.logger.warn(warning, None);
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Target, watch::Sender<BuildState>>> {
        self.states.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn entry<'a>(
    states: &'a mut HashMap<Target, watch::Sender<BuildState>>,
    target: &Target,
) -> &'a watch::Sender<BuildState> {
    states
        .entry(target.clone())
        .or_insert_with(|| watch::Sender::new(BuildState::idle(target.clone())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use multipack_core::{LogEntry, Reporter, UpdateAction};
    use tokio_test::{assert_pending, assert_ready};

    #[derive(Default)]
    struct Capture {
        entries: Mutex<Vec<LogEntry>>,
    }

    impl Reporter for Capture {
        fn process(&self, entry: LogEntry) {
            self.entries.lock().unwrap().push(entry);
        }

        fn flush(&self) {}

        fn stop(&self) {}
    }

    fn ios() -> Target {
        Target::new("ios").unwrap()
    }

    fn tracker() -> BuildTracker {
        BuildTracker::new(Arc::new(UpdateChannels::new()), Logger::noop())
    }

    fn ok(hash: &str) -> BuildOutcome {
        BuildOutcome {
            hash: hash.to_string(),
            duration_ms: 10,
            ..BuildOutcome::default()
        }
    }

    #[test]
    fn test_lifecycle() {
        let tracker = tracker();
        assert_eq!(tracker.state(&ios()).phase, BuildPhase::Idle);

        tracker.invalidate(&ios(), Some("App.js"));
        assert_eq!(tracker.state(&ios()).phase, BuildPhase::Invalid);

        let generation = tracker.begin(&ios());
        assert_eq!(generation, Generation(1));
        assert_eq!(tracker.state(&ios()).phase, BuildPhase::Building);

        let record = tracker.finish(&ios(), generation, ok("h1")).unwrap();
        assert_eq!(record.hash, "h1");
        let state = tracker.state(&ios());
        assert_eq!(state.phase, BuildPhase::Built);
        assert_eq!(state.latest.unwrap().generation, Generation(1));
    }

    #[test]
    fn test_errors_move_to_errored_and_keep_details() {
        let tracker = tracker();
        let generation = tracker.begin(&ios());
        let outcome = BuildOutcome {
            errors: vec!["SyntaxError".into()],
            warnings: vec!["unused".into()],
            ..ok("bad")
        };
        tracker.finish(&ios(), generation, outcome);

        let state = tracker.state(&ios());
        assert_eq!(state.phase, BuildPhase::Errored);
        let latest = state.latest.unwrap();
        assert_eq!(latest.errors, vec!["SyntaxError"]);
        assert_eq!(latest.warnings, vec!["unused"]);
    }

    #[test]
    fn test_superseded_completion_dropped() {
        let tracker = tracker();
        let first = tracker.begin(&ios());
        let second = tracker.begin(&ios());

        assert!(tracker.finish(&ios(), first, ok("old")).is_none());
        assert_eq!(tracker.state(&ios()).phase, BuildPhase::Building);

        tracker.finish(&ios(), second, ok("new")).unwrap();
        let state = tracker.state(&ios());
        assert_eq!(state.latest.unwrap().hash, "new");
        assert_eq!(state.generation, Generation(2));
    }

    #[test]
    fn test_completion_after_invalidate_dropped() {
        let tracker = tracker();
        let generation = tracker.begin(&ios());
        tracker.invalidate(&ios(), None);
        assert!(tracker.finish(&ios(), generation, ok("stale")).is_none());
        assert!(tracker.latest(&ios()).is_none());
    }

    #[test]
    fn test_waiter_pending_until_build_settles() {
        let tracker = tracker();
        let target = ios();
        tracker.begin(&target);

        let mut wait = tokio_test::task::spawn(tracker.wait_settled(&target));
        assert_pending!(wait.poll());

        tracker.finish_current(&ios(), ok("h1"));
        assert!(wait.is_woken());
        let state = assert_ready!(wait.poll());
        assert_eq!(state.latest.unwrap().hash, "h1");
    }

    #[test]
    fn test_waiter_skips_superseded_generation() {
        let tracker = tracker();
        let target = ios();
        let first = tracker.begin(&target);

        let mut wait = tokio_test::task::spawn(tracker.wait_settled(&target));
        assert_pending!(wait.poll());

        let second = tracker.begin(&ios());
        tracker.finish(&ios(), first, ok("old"));
        assert_pending!(wait.poll());

        tracker.finish(&ios(), second, ok("new"));
        let state = assert_ready!(wait.poll());
        assert_eq!(state.latest.unwrap().hash, "new");
    }

    #[test]
    fn test_settled_target_resolves_immediately() {
        let tracker = tracker();
        let generation = tracker.begin(&ios());
        tracker.finish(&ios(), generation, ok("h1"));

        let target = ios();
        let mut wait = tokio_test::task::spawn(tracker.wait_settled(&target));
        let state = assert_ready!(wait.poll());
        assert_eq!(state.generation, Generation(1));
    }

    #[test]
    fn test_transitions_published_to_subscribers() {
        let tracker = tracker();
        let channels = tracker.channels().clone();
        let mut rx = channels.subscribe(&ios(), channels.next_connection_id());

        tracker.apply(&ios(), BuildEvent::Invalid { file: None });
        tracker.apply(&ios(), BuildEvent::Started);
        tracker.apply(&ios(), BuildEvent::Finished { outcome: ok("h1") });

        let actions: Vec<UpdateAction> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|msg| msg.action)
            .collect();
        assert_eq!(
            actions,
            vec![UpdateAction::Sync, UpdateAction::Building, UpdateAction::Built]
        );
    }

    #[test]
    fn test_outcome_logging_can_be_disabled() {
        let capture = Arc::new(Capture::default());
        let logger = Logger::new(capture.clone(), "BuildTracker");

        let loud = BuildTracker::new(Arc::new(UpdateChannels::new()), logger.clone());
        let generation = loud.begin(&ios());
        loud.finish(&ios(), generation, ok("h1"));
        assert_eq!(capture.entries.lock().unwrap().len(), 1);

        let quiet = BuildTracker::new(Arc::new(UpdateChannels::new()), logger)
            .with_outcome_logging(false);
        let generation = quiet.begin(&ios());
        quiet.finish(&ios(), generation, ok("h2"));
        assert_eq!(capture.entries.lock().unwrap().len(), 1);
        assert_eq!(quiet.state(&ios()).phase, BuildPhase::Built);
    }

    #[test]
    fn test_finish_without_begin_ignored() {
        let tracker = tracker();
        assert!(tracker.finish_current(&ios(), ok("h")).is_none());
        assert_eq!(tracker.state(&ios()).phase, BuildPhase::Idle);
    }
}
