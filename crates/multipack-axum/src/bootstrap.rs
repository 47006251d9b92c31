//! Axum server bootstrap - the composition root of the gateway.
//!
//! This module is the only place where the backend variant is chosen and the
//! runtime services are wired together. The reporter stack is built by the
//! caller and handed in through [`BootstrapDeps`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Context, Result};
use multipack_core::{BackendMode, DevServerConfig, Target, TargetResolver, WorkerCommand};
use multipack_runtime::{
    BroadcastReporter, BuildTracker, CommandCompiler, InProcessBackend, Logger, ProxiedBackend,
    Symbolicator, UpdateChannels, WorkerOrchestrator,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::control::ControlHub;
use crate::gateway::Gateway;
use crate::routes::create_router;

/// Collaborators built outside the gateway.
#[derive(Debug, Clone)]
pub struct BootstrapDeps {
    /// Reporter handle every component logs through.
    pub logger: Logger,
    /// Sink behind `/api/events`. Must also be part of the logger's reporter.
    pub events: Arc<BroadcastReporter>,
    /// How worker processes are launched in multi-process mode.
    pub worker_command: WorkerCommand,
}

/// Application context for the Axum adapter.
///
/// Holds every service the handlers need. There are no global singletons;
/// tests build their own context.
pub struct AxumContext {
    pub config: Arc<DevServerConfig>,
    pub gateway: Gateway,
    pub channels: Arc<UpdateChannels>,
    pub resolver: TargetResolver,
    pub symbolicator: Symbolicator,
    pub control: ControlHub,
    pub events: Arc<BroadcastReporter>,
    pub logger: Logger,
    /// Cancelled to stop the server.
    pub shutdown: CancellationToken,
    request_ids: AtomicU64,
}

impl std::fmt::Debug for AxumContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AxumContext")
            .field("gateway", &self.gateway)
            .field("targets", &self.resolver.targets())
            .finish_non_exhaustive()
    }
}

impl AxumContext {
    pub fn new(
        config: Arc<DevServerConfig>,
        gateway: Gateway,
        channels: Arc<UpdateChannels>,
        events: Arc<BroadcastReporter>,
        logger: Logger,
    ) -> Self {
        let resolver = TargetResolver::new(gateway.backend().targets());
        let symbolicator = Symbolicator::new(gateway.backend(), resolver.clone());
        Self {
            config,
            gateway,
            channels,
            resolver,
            symbolicator,
            control: ControlHub::new(),
            events,
            logger,
            shutdown: CancellationToken::new(),
            request_ids: AtomicU64::new(0),
        }
    }

    /// Fresh id correlating the two halves of a request record.
    pub fn next_request_id(&self) -> String {
        format!("req-{}", self.request_ids.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

/// Build an in-process backend for `targets` around the configured bundler.
pub fn in_process_backend(
    config: &DevServerConfig,
    targets: Vec<Target>,
    tracker: Arc<BuildTracker>,
    logger: &Logger,
) -> InProcessBackend {
    let compiler = CommandCompiler::new(
        config.compiler.clone(),
        config.build_config_path.clone(),
        config.output_dir.clone(),
        config.shutdown_grace,
        logger.with_issuer("Compiler"),
    );
    InProcessBackend::new(targets, Arc::new(compiler), tracker, logger.clone())
}

/// Wire the gateway for `config.mode`.
pub fn bootstrap(config: DevServerConfig, deps: BootstrapDeps) -> Result<AxumContext> {
    let config = Arc::new(config);
    let logger = deps.logger;
    let channels = Arc::new(UpdateChannels::new());
    let tracker = Arc::new(BuildTracker::new(
        Arc::clone(&channels),
        logger.with_issuer("BuildTracker"),
    ));

    let gateway = match config.mode {
        BackendMode::MultiProcess => {
            let orchestrator = WorkerOrchestrator::new(
                Arc::clone(&config),
                deps.worker_command,
                tracker,
                logger.with_issuer("Orchestrator"),
            );
            let backend =
                ProxiedBackend::new(config.targets.clone(), orchestrator, config.forward_timeout)?;
            Gateway::MultiProcess(Arc::new(backend))
        }
        BackendMode::InProcess => Gateway::InProcess(Arc::new(in_process_backend(
            &config,
            config.targets.clone(),
            tracker,
            &logger,
        ))),
    };

    info!(mode = ?config.mode, targets = ?config.targets, "Gateway bootstrapped");
    Ok(AxumContext::new(config, gateway, channels, deps.events, logger))
}

/// Serve `ctx` on `listener` until `ctx.shutdown` is cancelled.
///
/// Backend shutdown starts together with the graceful HTTP shutdown so that
/// requests parked on a build or a worker are released instead of holding
/// the server open.
pub async fn serve(listener: TcpListener, ctx: AxumContext) -> Result<()> {
    let ctx = Arc::new(ctx);
    let shutdown = ctx.shutdown.clone();

    let backend_shutdown = tokio::spawn({
        let ctx = Arc::clone(&ctx);
        async move {
            ctx.shutdown.cancelled().await;
            ctx.gateway.shutdown().await;
        }
    });

    let app = create_router(Arc::clone(&ctx));
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.clone().cancelled_owned())
        .await;

    shutdown.cancel();
    if let Err(e) = backend_shutdown.await {
        warn!(error = %e, "Backend shutdown task failed");
    }
    served.context("HTTP server failed")
}
