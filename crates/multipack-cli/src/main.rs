//! CLI entry point - the composition root.
//!
//! Parses arguments, initialises tracing and dispatches to the `start` or
//! hidden `worker` handler.

use std::process::ExitCode;

use clap::Parser;

use multipack_cli::{Cli, CliError, Commands, handlers, init_tracing};

#[tokio::main]
async fn main() -> ExitCode {
    // Load environment variables
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing();

    let result = match cli.command {
        Commands::Start(args) => handlers::start::execute(args).await,
        Commands::Worker => handlers::worker::execute().await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            let code = e.downcast_ref::<CliError>().map_or(1, CliError::exit_code);
            ExitCode::from(code)
        }
    }
}
