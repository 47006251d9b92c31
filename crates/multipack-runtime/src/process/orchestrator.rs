//! Worker Orchestrator.
//!
//! Spawns one isolated worker process per target on demand, tracks its
//! readiness and tears everything down on shutdown.
//!
//! A worker is *ready* only once it reports `build_started` on its control
//! channel; process start alone is not enough. Exit before readiness is a
//! spawn failure: the waiters are rejected and the slot is removed so the
//! next request may retry. There is no background restart loop.

use std::collections::HashMap;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use multipack_core::{
    CONFIG_ENV_KEY, ControlEvent, DevServerConfig, LogEntry, LogType, Target, VERBOSE_ENV_KEY,
    WORKER_ENV_KEY, WORKER_HOST, WorkerCommand, WorkerConfig, WorkerMessage, WorkerSpawnError,
};
use serde_json::json;
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

use super::ports::allocate_ephemeral_port;
use super::readiness::{Join, WorkerSlot};
use super::shutdown::shutdown_child;
use super::stream::spawn_line_reader;
use super::types::{EnsureOutcome, WorkerHandle, WorkerInfo, WorkerStatus};
use crate::build::BuildTracker;
use crate::logger::Logger;

struct WorkerEntry {
    slot: WorkerSlot,
    port: Option<u16>,
    cancel: CancellationToken,
}

struct Inner {
    config: Arc<DevServerConfig>,
    command: WorkerCommand,
    tracker: Arc<BuildTracker>,
    logger: Logger,
    workers: Mutex<HashMap<Target, WorkerEntry>>,
    shutdown: CancellationToken,
    tasks: TaskTracker,
}

/// Spawns and supervises per-target worker processes.
#[derive(Clone)]
pub struct WorkerOrchestrator {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for WorkerOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerOrchestrator")
            .field("command", &self.inner.command)
            .finish_non_exhaustive()
    }
}

impl WorkerOrchestrator {
    /// Create an orchestrator launching workers with `command`.
    ///
    /// Build events reported by workers are applied to `tracker`.
    pub fn new(
        config: Arc<DevServerConfig>,
        command: WorkerCommand,
        tracker: Arc<BuildTracker>,
        logger: Logger,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                command,
                tracker,
                logger,
                workers: Mutex::new(HashMap::new()),
                shutdown: CancellationToken::new(),
                tasks: TaskTracker::new(),
            }),
        }
    }

    /// Tracker receiving worker build events.
    pub fn tracker(&self) -> &Arc<BuildTracker> {
        &self.inner.tracker
    }

    /// Ensure a ready worker exists for `target`, spawning one if needed.
    ///
    /// Concurrent calls for the same target share one spawn. A call that
    /// joins an in-flight spawn logs a warning and waits for the same handle.
    pub async fn ensure_worker(&self, target: &Target) -> Result<EnsureOutcome, WorkerSpawnError> {
        if self.inner.shutdown.is_cancelled() {
            return Err(WorkerSpawnError::ShuttingDown);
        }

        let (rx, spawned) = {
            let mut workers = self.inner.lock();
            if let Some(entry) = workers.get_mut(target) {
                match entry.slot.join() {
                    Join::Ready(handle) => {
                        return Ok(EnsureOutcome {
                            handle,
                            spawned: false,
                        });
                    }
                    Join::Wait(rx) => {
                        self.inner.logger.warn(
                            &format!("{target} worker is already starting"),
                            Some(json!({ "target": target })),
                        );
                        (rx, false)
                    }
                }
            } else {
                let (slot, rx) = WorkerSlot::with_waiter();
                workers.insert(
                    target.clone(),
                    WorkerEntry {
                        slot,
                        port: None,
                        cancel: self.inner.shutdown.child_token(),
                    },
                );
                (rx, true)
            }
        };

        if spawned {
            if let Err(error) = self.inner.spawn(target) {
                self.inner.logger.error(&error.to_string(), None);
                self.inner.discard(target, &error);
            }
        }

        let handle = rx.await.map_err(|_| WorkerSpawnError::ShuttingDown)??;
        Ok(EnsureOutcome { handle, spawned })
    }

    /// Handle of the ready worker for `target`, if any.
    pub fn ready_handle(&self, target: &Target) -> Option<WorkerHandle> {
        self.inner
            .lock()
            .get(target)
            .and_then(|entry| entry.slot.handle().cloned())
    }

    /// Snapshot of every tracked worker, sorted by target.
    pub fn workers(&self) -> Vec<WorkerInfo> {
        let mut infos: Vec<WorkerInfo> = self
            .inner
            .lock()
            .iter()
            .map(|(target, entry)| WorkerInfo {
                target: target.clone(),
                status: if entry.slot.is_ready() {
                    WorkerStatus::Ready
                } else {
                    WorkerStatus::Starting
                },
                port: entry.port,
            })
            .collect();
        infos.sort_by(|a, b| a.target.cmp(&b.target));
        infos
    }

    /// Terminate every worker and wait for them to exit.
    ///
    /// Each worker gets the configured grace period after SIGTERM before it
    /// is killed. Pending `ensure_worker` calls fail with `ShuttingDown`.
    pub async fn shutdown(&self) {
        self.inner.shutdown.cancel();

        let entries: Vec<(Target, WorkerEntry)> = self.inner.lock().drain().collect();
        for (target, entry) in entries {
            debug!(target = %target, "Stopping worker");
            entry.cancel.cancel();
            entry.slot.fail(&WorkerSpawnError::ShuttingDown);
        }

        self.inner.tasks.close();
        self.inner.tasks.wait().await;
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, HashMap<Target, WorkerEntry>> {
        self.workers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn spawn(self: &Arc<Self>, target: &Target) -> Result<(), WorkerSpawnError> {
        let port = allocate_ephemeral_port(WORKER_HOST).map_err(|e| {
            WorkerSpawnError::PortUnavailable {
                target: target.clone(),
                reason: e.to_string(),
            }
        })?;

        let worker_config = WorkerConfig {
            server: (*self.config).clone(),
            target: target.clone(),
            port,
        };
        let env_value = worker_config
            .to_env_value()
            .map_err(|e| WorkerSpawnError::StartFailed {
                target: target.clone(),
                reason: e.to_string(),
            })?;

        let mut cmd = Command::new(&self.command.program);
        cmd.args(&self.command.args)
            .env(CONFIG_ENV_KEY, env_value)
            .env(WORKER_ENV_KEY, "1")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if self.config.is_verbose() {
            cmd.env(VERBOSE_ENV_KEY, "1");
        }

        let mut child = cmd.spawn().map_err(|e| WorkerSpawnError::StartFailed {
            target: target.clone(),
            reason: e.to_string(),
        })?;

        let handle = WorkerHandle {
            target: target.clone(),
            port,
            pid: child.id(),
        };

        let cancel = {
            let mut workers = self.lock();
            let Some(entry) = workers.get_mut(target) else {
                // Shutdown drained the slot while the process was starting.
                self.tasks.spawn(reap(child, self.config.shutdown_grace));
                return Err(WorkerSpawnError::ShuttingDown);
            };
            entry.port = Some(port);
            entry.cancel.clone()
        };

        self.logger.info(
            &format!("Starting {target} worker on port {port}"),
            Some(json!({ "target": target, "port": port, "pid": handle.pid })),
        );

        self.attach_output(&mut child, &handle);
        let inner = Arc::clone(self);
        self.tasks.spawn(async move {
            inner.supervise(child, handle, cancel).await;
        });
        Ok(())
    }

    fn attach_output(self: &Arc<Self>, child: &mut Child, handle: &WorkerHandle) {
        if let Some(stdout) = child.stdout.take() {
            let inner = Arc::clone(self);
            let handle = handle.clone();
            spawn_line_reader(stdout, format!("{}:stdout", handle.target), move |line| {
                inner.handle_line(&handle, &line);
            });
        }
        if let Some(stderr) = child.stderr.take() {
            let inner = Arc::clone(self);
            let handle = handle.clone();
            spawn_line_reader(stderr, format!("{}:stderr", handle.target), move |line| {
                inner.handle_line(&handle, &line);
            });
        }
    }

    fn handle_line(&self, handle: &WorkerHandle, line: &str) {
        let target = &handle.target;
        match WorkerMessage::parse_line(line) {
            Ok(WorkerMessage::Log(mut entry)) => {
                if entry.issuer.is_empty() {
                    entry.issuer = worker_issuer(target);
                }
                self.logger.process(entry);
            }
            Ok(WorkerMessage::Build { event }) => self.tracker.apply(target, event),
            Ok(WorkerMessage::Control(ControlEvent::BuildStarted { target: reported })) => {
                if &reported == target {
                    self.mark_ready(handle);
                } else {
                    warn!(worker = %target, reported = %reported, "Worker reported readiness for another target");
                }
            }
            Err(_) => {
                self.logger
                    .process(LogEntry::text(worker_issuer(target), LogType::Warn, line));
            }
        }
    }

    fn mark_ready(&self, handle: &WorkerHandle) {
        let became_ready = {
            let mut workers = self.lock();
            match workers.get_mut(&handle.target) {
                Some(entry) if entry.port == Some(handle.port) => {
                    entry.slot.mark_ready(handle.clone())
                }
                _ => false,
            }
        };
        if became_ready {
            self.logger.info(
                &format!("{} worker ready on port {}", handle.target, handle.port),
                Some(json!({ "target": handle.target, "port": handle.port })),
            );
        }
    }

    async fn supervise(&self, mut child: Child, handle: WorkerHandle, cancel: CancellationToken) {
        let exited = tokio::select! {
            status = child.wait() => Some(status),
            () = cancel.cancelled() => None,
        };

        match exited {
            Some(status) => self.on_exit(&handle, &status),
            None => {
                let grace = self.config.shutdown_grace;
                match shutdown_child(child, grace).await {
                    Ok(status) => debug!(worker = %handle, %status, "Worker stopped"),
                    Err(e) => warn!(worker = %handle, error = %e, "Failed to stop worker"),
                }
            }
        }
    }

    fn on_exit(&self, handle: &WorkerHandle, status: &std::io::Result<ExitStatus>) {
        let status = match status {
            Ok(status) => status.to_string(),
            Err(e) => e.to_string(),
        };

        let entry = {
            let mut workers = self.lock();
            match workers.get(&handle.target) {
                Some(entry) if entry.port == Some(handle.port) => workers.remove(&handle.target),
                _ => None,
            }
        };
        let Some(entry) = entry else {
            return;
        };

        let target = &handle.target;
        if entry.slot.is_ready() {
            self.logger.error(
                &format!("{target} worker exited ({status})"),
                Some(json!({ "target": target, "port": handle.port })),
            );
        } else {
            let error = WorkerSpawnError::ExitedBeforeReady {
                target: target.clone(),
                status,
            };
            self.logger.error(&error.to_string(), None);
            entry.slot.fail(&error);
        }
    }

    fn discard(&self, target: &Target, error: &WorkerSpawnError) {
        let entry = self.lock().remove(target);
        if let Some(entry) = entry {
            entry.slot.fail(error);
        }
    }
}

async fn reap(child: Child, grace: Duration) {
    let _ = shutdown_child(child, grace).await;
}

fn worker_issuer(target: &Target) -> String {
    format!("Worker({target})")
}
