//! Main CLI parser.

use clap::Parser;

use crate::commands::Commands;

/// Multi-target development server for bundled JavaScript apps.
#[derive(Debug, Parser)]
#[command(name = "multipack")]
#[command(about = "Build and serve several bundle targets behind one dev server")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parser_builds() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_worker_subcommand_is_hidden() {
        let help = Cli::command().render_help().to_string();
        assert!(help.contains("start"));
        assert!(!help.contains("worker"));

        let cli = Cli::try_parse_from(["multipack", "worker"]).unwrap();
        assert!(matches!(cli.command, Commands::Worker));
    }

    #[test]
    fn test_missing_subcommand_is_rejected() {
        assert!(Cli::try_parse_from(["multipack"]).is_err());
    }
}
