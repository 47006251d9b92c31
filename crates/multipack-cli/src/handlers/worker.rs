//! Hidden `multipack worker` - a single-target build backend.
//!
//! Spawned by the gateway's orchestrator with its configuration in the
//! environment. Serves that target's assets on `127.0.0.1:<port>` and speaks
//! the worker protocol on stdout: log entries, build lifecycle events and the
//! `build_started` readiness signal.
//!
//! The worker exits when its bundler does, so the gateway respawns it on the
//! next request.

use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use multipack_axum::{AxumContext, Gateway, in_process_backend, serve};
use multipack_core::{
    BuildEvent, ControlEvent, Reporter, Target, VERBOSE_ENV_KEY, WORKER_HOST, WorkerConfig,
    WorkerMessage,
};
use multipack_runtime::{
    BroadcastReporter, BuildObserver, BuildTracker, Logger, UpdateChannels,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use super::cancel_on_signal;
use crate::bootstrap::build_worker_reporter;
use crate::error::CliError;

/// Relays the backend lifecycle to the gateway over stdout.
struct StdoutProtocol {
    bundler_exited: CancellationToken,
}

impl StdoutProtocol {
    fn emit(message: &WorkerMessage) {
        match message.to_line() {
            Ok(line) => {
                let mut out = std::io::stdout().lock();
                let _ = writeln!(out, "{line}");
                let _ = out.flush();
            }
            Err(e) => tracing::warn!(error = %e, "Failed to encode worker message"),
        }
    }
}

impl BuildObserver for StdoutProtocol {
    fn watch_started(&self, target: &Target) {
        Self::emit(&WorkerMessage::Control(ControlEvent::BuildStarted {
            target: target.clone(),
        }));
    }

    fn build_event(&self, _target: &Target, event: &BuildEvent) {
        Self::emit(&WorkerMessage::Build {
            event: event.clone(),
        });
    }

    fn pipeline_stopped(&self, _target: &Target) {
        self.bundler_exited.cancel();
    }
}

pub async fn execute() -> Result<()> {
    let WorkerConfig {
        mut server,
        target,
        port,
    } = WorkerConfig::from_env().map_err(CliError::from)?;
    // The gateway logs requests once; workers stay quiet.
    server.log_requests = false;

    let reporter = build_worker_reporter(std::env::var_os(VERBOSE_ENV_KEY).is_some());
    // Empty issuer: the gateway labels worker output with the target.
    let logger = Logger::new(Arc::clone(&reporter) as Arc<dyn Reporter>, "");

    let addr = format!("{WORKER_HOST}:{port}");
    let listener = TcpListener::bind(&addr).await.map_err(|e| CliError::Bind {
        addr: addr.clone(),
        reason: e.to_string(),
    })?;

    let channels = Arc::new(UpdateChannels::new());
    // The gateway's tracker reports build outcomes.
    let tracker = Arc::new(
        BuildTracker::new(Arc::clone(&channels), logger.clone()).with_outcome_logging(false),
    );
    let bundler_exited = CancellationToken::new();
    let backend = Arc::new(
        in_process_backend(&server, vec![target.clone()], tracker, &logger).with_observer(
            Arc::new(StdoutProtocol {
                bundler_exited: bundler_exited.clone(),
            }),
        ),
    );

    let ctx = AxumContext::new(
        Arc::new(server),
        Gateway::InProcess(Arc::clone(&backend)),
        channels,
        Arc::new(BroadcastReporter::default()),
        logger.clone(),
    );
    cancel_on_signal(ctx.shutdown.clone());
    stop_with_bundler(bundler_exited.clone(), ctx.shutdown.clone());

    backend
        .watch_target(&target)
        .await
        .with_context(|| format!("Failed to start watch mode for {target}"))?;
    logger.debug(&format!("Worker for {target} listening on {addr}"), None);

    let served = serve(listener, ctx).await;
    reporter.stop();
    served?;
    if bundler_exited.is_cancelled() {
        bail!("Compiler for {target} exited");
    }
    Ok(())
}

/// Cancel `shutdown` once the bundler is gone.
fn stop_with_bundler(bundler_exited: CancellationToken, shutdown: CancellationToken) {
    tokio::spawn(async move {
        tokio::select! {
            () = bundler_exited.cancelled() => shutdown.cancel(),
            () = shutdown.cancelled() => {}
        }
    });
}
