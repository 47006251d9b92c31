//! Aggregated backend: every target compiles inside this process.
//!
//! Watch mode starts lazily, the first time a target is asked for anything
//! that needs its artifacts. Bundler events are pumped into the build
//! tracker in emission order, one task per target.
//!
//! When a bundler's event stream ends, its waiters fail with
//! [`CompilerError::Exited`] and the next request starts watch mode again.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use bytes::Bytes;
use multipack_core::{
    Asset, BackendError, BuildBackend, BuildEvent, BuildOutcome, BuildPhase, BuildState, Compiler,
    CompilerError, CompilerEvent, Generation, LogEntry, Target,
};
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::debug;

use crate::build::BuildTracker;
use crate::compiler::log_compiler_message;
use crate::logger::Logger;

/// Observes the build lifecycle of an [`InProcessBackend`].
///
/// Worker processes use this to relay their lifecycle to the gateway.
pub trait BuildObserver: Send + Sync {
    /// The watch loop of `target` started.
    fn watch_started(&self, _target: &Target) {}

    /// The tracker accepted a lifecycle event for `target`.
    fn build_event(&self, _target: &Target, _event: &BuildEvent) {}

    /// The bundler of `target` stopped emitting events.
    fn pipeline_stopped(&self, _target: &Target) {}
}

type AssetCache = HashMap<String, Bytes>;

/// Running watch loops, each with a token cancelled when its stream ends.
type Pipelines = Arc<Mutex<HashMap<Target, CancellationToken>>>;

/// [`BuildBackend`] compiling every target in this process.
pub struct InProcessBackend {
    targets: Vec<Target>,
    compiler: Arc<dyn Compiler>,
    tracker: Arc<BuildTracker>,
    logger: Logger,
    observer: Option<Arc<dyn BuildObserver>>,
    watching: Pipelines,
    assets: Arc<RwLock<HashMap<Target, AssetCache>>>,
    cancel: CancellationToken,
    tasks: TaskTracker,
}

impl std::fmt::Debug for InProcessBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InProcessBackend")
            .field("targets", &self.targets)
            .field("compiler", &self.compiler)
            .finish_non_exhaustive()
    }
}

impl InProcessBackend {
    pub fn new(
        targets: Vec<Target>,
        compiler: Arc<dyn Compiler>,
        tracker: Arc<BuildTracker>,
        logger: Logger,
    ) -> Self {
        Self {
            targets,
            compiler,
            tracker,
            logger,
            observer: None,
            watching: Arc::new(Mutex::new(HashMap::new())),
            assets: Arc::new(RwLock::new(HashMap::new())),
            cancel: CancellationToken::new(),
            tasks: TaskTracker::new(),
        }
    }

    /// Report lifecycle changes to `observer`.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn BuildObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn tracker(&self) -> &Arc<BuildTracker> {
        &self.tracker
    }

    fn check_target(&self, target: &Target) -> Result<(), BackendError> {
        if self.targets.contains(target) {
            Ok(())
        } else {
            Err(BackendError::UnknownTarget(target.to_string()))
        }
    }

    /// Start watch mode for `target` unless it is already running.
    pub async fn watch_target(&self, target: &Target) -> Result<(), BackendError> {
        self.ensure_watching(target).await.map(drop)
    }

    /// Returns the token cancelled when this watch loop's stream ends.
    async fn ensure_watching(&self, target: &Target) -> Result<CancellationToken, BackendError> {
        self.check_target(target)?;
        if self.cancel.is_cancelled() {
            return Err(BackendError::ShuttingDown);
        }

        let mut watching = self.watching.lock().await;
        if let Some(stopped) = watching.get(target) {
            return Ok(stopped.clone());
        }

        let events = self.compiler.watch(target).await?;
        let stopped = CancellationToken::new();
        watching.insert(target.clone(), stopped.clone());
        drop(watching);

        let pump = EventPump {
            target: target.clone(),
            compiler: Arc::clone(&self.compiler),
            tracker: Arc::clone(&self.tracker),
            logger: self.logger.with_issuer(&format!("Compiler({target})")),
            observer: self.observer.clone(),
            assets: Arc::clone(&self.assets),
            watching: Arc::clone(&self.watching),
            stopped: stopped.clone(),
            current: None,
        };
        self.tasks.spawn(pump.run(events, self.cancel.child_token()));
        debug!(target = %target, "Watch started");
        Ok(stopped)
    }

    /// Wait until the latest build of `target` settled.
    async fn settled(&self, target: &Target) -> Result<BuildState, BackendError> {
        let stopped = self.ensure_watching(target).await?;
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(BackendError::ShuttingDown),
            state = self.tracker.wait_settled(target) => Ok(state),
            () = stopped.cancelled() => Err(CompilerError::Exited {
                target: target.clone(),
            }
            .into()),
        }
    }

    async fn read(&self, target: &Target, name: &str) -> Result<Option<Bytes>, BackendError> {
        let cached = self
            .assets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(target)
            .and_then(|assets| assets.get(name).cloned());
        match cached {
            Some(bytes) => Ok(Some(bytes)),
            None => Ok(self.compiler.read_asset(target, name).await?),
        }
    }
}

#[async_trait]
impl BuildBackend for InProcessBackend {
    fn targets(&self) -> Vec<Target> {
        self.targets.clone()
    }

    async fn get_asset(&self, target: &Target, name: &str) -> Result<Asset, BackendError> {
        self.settled(target).await?;
        self.read(target, name)
            .await?
            .map(|bytes| Asset::from_bytes(name, bytes))
            .ok_or_else(|| BackendError::AssetNotFound {
                target: target.clone(),
                name: name.to_string(),
            })
    }

    async fn get_source_map(
        &self,
        target: &Target,
        name: &str,
    ) -> Result<Option<Bytes>, BackendError> {
        self.settled(target).await?;
        self.read(target, &format!("{name}.map")).await
    }

    async fn get_build_state(&self, target: &Target) -> Result<BuildState, BackendError> {
        self.check_target(target)?;
        Ok(self.tracker.state(target))
    }

    async fn shutdown(&self) {
        self.cancel.cancel();
        self.compiler.stop().await;
        self.tasks.close();
        self.tasks.wait().await;
    }
}

/// Feeds one target's bundler events into the tracker.
struct EventPump {
    target: Target,
    compiler: Arc<dyn Compiler>,
    tracker: Arc<BuildTracker>,
    logger: Logger,
    observer: Option<Arc<dyn BuildObserver>>,
    assets: Arc<RwLock<HashMap<Target, AssetCache>>>,
    watching: Pipelines,
    stopped: CancellationToken,
    current: Option<Generation>,
}

impl EventPump {
    async fn run(mut self, mut events: mpsc::UnboundedReceiver<CompilerEvent>, cancel: CancellationToken) {
        loop {
            let event = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                event = events.recv() => event,
            };
            let Some(event) = event else {
                self.stream_closed().await;
                break;
            };
            self.handle(event).await;
        }
    }

    async fn stream_closed(&self) {
        self.watching.lock().await.remove(&self.target);
        self.stopped.cancel();
        self.logger.error(&format!("Compiler for {} exited", self.target), None);
        if let Some(observer) = &self.observer {
            observer.pipeline_stopped(&self.target);
        }
    }

    async fn handle(&mut self, event: CompilerEvent) {
        match event {
            CompilerEvent::WatchRun => {
                self.invalidate(None);
                if let Some(observer) = &self.observer {
                    observer.watch_started(&self.target);
                }
            }
            CompilerEvent::Invalid { file } => self.invalidate(file),
            CompilerEvent::Compile => {
                self.current = Some(self.tracker.begin(&self.target));
                self.notify(&BuildEvent::Started);
            }
            CompilerEvent::Progress { value, label } => {
                self.logger.process(LogEntry::progress(
                    self.logger.issuer(),
                    &self.target,
                    value,
                    &label,
                ));
            }
            CompilerEvent::Done {
                hash,
                time,
                warnings,
                errors,
                assets,
            } => {
                let outcome = BuildOutcome {
                    hash,
                    duration_ms: time,
                    warnings,
                    errors,
                    assets,
                };
                self.done(outcome).await;
            }
            CompilerEvent::Log { level, message } => {
                log_compiler_message(&self.logger, &level, &message);
            }
        }
    }

    fn invalidate(&self, file: Option<String>) {
        self.tracker.invalidate(&self.target, file.as_deref());
        self.notify(&BuildEvent::Invalid { file });
    }

    async fn done(&mut self, outcome: BuildOutcome) {
        let generation = match self.current.take() {
            Some(generation) => generation,
            None => {
                // The bundler skipped its compile event.
                let generation = self.tracker.begin(&self.target);
                self.notify(&BuildEvent::Started);
                generation
            }
        };

        let state = self.tracker.state(&self.target);
        if state.generation != generation || state.phase != BuildPhase::Building {
            debug!(target = %self.target, generation = %generation, "Ignoring superseded build");
            return;
        }

        // Artifacts are in place before waiters are released; an errored
        // build keeps the previous good ones.
        if !outcome.has_errors() {
            let cache = self.load_assets(&outcome).await;
            self.assets
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(self.target.clone(), cache);
        }

        let event = BuildEvent::Finished {
            outcome: outcome.clone(),
        };
        if self.tracker.finish(&self.target, generation, outcome).is_some() {
            self.notify(&event);
        }
    }

    async fn load_assets(&self, outcome: &BuildOutcome) -> AssetCache {
        let mut cache = AssetCache::new();
        for summary in &outcome.assets {
            match self.compiler.read_asset(&self.target, &summary.name).await {
                Ok(Some(bytes)) => {
                    cache.insert(summary.name.clone(), bytes);
                }
                Ok(None) => debug!(target = %self.target, asset = %summary.name, "Reported asset missing"),
                Err(e) => self.logger.warn(&e.to_string(), None),
            }
        }
        cache
    }

    fn notify(&self, event: &BuildEvent) {
        if let Some(observer) = &self.observer {
            observer.build_event(&self.target, event);
        }
    }
}
