//! `multipack start` - run the gateway.

use anyhow::Result;
use multipack_axum::{BootstrapDeps, bootstrap, serve};
use multipack_core::WorkerCommand;
use serde_json::json;
use tokio::net::TcpListener;

use super::cancel_on_signal;
use crate::bootstrap::build_reporters;
use crate::commands::StartArgs;
use crate::error::CliError;

pub async fn execute(args: StartArgs) -> Result<()> {
    let config = args.into_config().map_err(CliError::from)?;
    let worker_command = WorkerCommand::current_exe().map_err(CliError::from)?;

    let reporters = build_reporters(&config);
    let logger = reporters.logger("Server");

    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr).await.map_err(|e| CliError::Bind {
        addr: addr.clone(),
        reason: e.to_string(),
    })?;

    let deps = BootstrapDeps {
        logger: logger.clone(),
        events: reporters.events.clone(),
        worker_command,
    };
    let ctx = bootstrap(config, deps)?;
    logger.info(
        &format!("Dev server listening on http://{addr}"),
        Some(json!({
            "mode": ctx.config.mode,
            "targets": ctx.config.targets,
        })),
    );

    cancel_on_signal(ctx.shutdown.clone());
    let served = serve(listener, ctx).await;

    logger.info("Dev server stopped", None);
    reporters.stop();
    served
}
