//! Subcommand definitions and mapping onto [`DevServerConfig`].

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};
use multipack_core::{
    BackendMode, CompilerCommand, ConfigurationError, DEFAULT_HMR_PATH, DEFAULT_PORT,
    DevServerConfig, Target, Verbosity,
};

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start the dev server
    Start(StartArgs),

    /// Run a single-target build worker (spawned by `start`)
    #[command(hide = true)]
    Worker,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    /// One worker process per target
    MultiProcess,
    /// Every target inside the server process
    InProcess,
}

impl From<ModeArg> for BackendMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::MultiProcess => Self::MultiProcess,
            ModeArg::InProcess => Self::InProcess,
        }
    }
}

/// Flags of `multipack start`.
#[derive(Debug, Clone, Args)]
pub struct StartArgs {
    /// Address to listen on
    #[arg(long, env = "MULTIPACK_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "MULTIPACK_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Comma-separated build targets, e.g. `ios,android`
    #[arg(long, value_delimiter = ',', required = true)]
    pub targets: Vec<String>,

    /// Bundler configuration file
    #[arg(long = "config")]
    pub config: PathBuf,

    /// Backend deployment mode
    #[arg(long, value_enum, default_value_t = ModeArg::MultiProcess)]
    pub mode: ModeArg,

    /// Bundler command line, started once per target in watch mode
    #[arg(long, env = "MULTIPACK_COMPILER")]
    pub compiler_command: String,

    /// Directory receiving build artifacts [default: <config dir>/.multipack]
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Seconds to wait for a worker response before answering 504
    #[arg(long, default_value_t = 300)]
    pub forward_timeout_secs: u64,

    /// Seconds workers get to exit before they are killed
    #[arg(long, default_value_t = 5)]
    pub shutdown_grace_secs: u64,

    /// Path of the live-update WebSocket
    #[arg(long, default_value = DEFAULT_HMR_PATH)]
    pub hmr_path: String,

    /// Also write every log entry to this file
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Print log entries as JSON lines
    #[arg(long)]
    pub json: bool,

    /// Show debug output (implies --log-requests)
    #[arg(short, long, conflicts_with = "silent")]
    pub verbose: bool,

    /// Print nothing to the console
    #[arg(short, long)]
    pub silent: bool,

    /// Log every HTTP request
    #[arg(long)]
    pub log_requests: bool,
}

impl StartArgs {
    /// Build and validate the server configuration.
    pub fn into_config(self) -> Result<DevServerConfig, ConfigurationError> {
        let targets = self
            .targets
            .iter()
            .map(|name| name.trim())
            .filter(|name| !name.is_empty())
            .map(Target::new)
            .collect::<Result<Vec<_>, _>>()?;
        let compiler = CompilerCommand::parse(&self.compiler_command)?;

        let mut config = DevServerConfig::new(targets, self.config, compiler);
        config.host = self.host;
        config.port = self.port;
        config.mode = self.mode.into();
        if let Some(output_dir) = self.output_dir {
            config.output_dir = output_dir;
        }
        config.forward_timeout = Duration::from_secs(self.forward_timeout_secs);
        config.shutdown_grace = Duration::from_secs(self.shutdown_grace_secs);
        config.hmr_path = self.hmr_path;
        config.log_file = self.log_file;
        config.json = self.json;
        config.verbosity = if self.verbose {
            Verbosity::Verbose
        } else if self.silent {
            Verbosity::Silent
        } else {
            Verbosity::Normal
        };
        config.log_requests = self.log_requests || self.verbose;

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Cli;
    use clap::Parser;

    fn start_args(extra: &[&str]) -> StartArgs {
        let mut argv = vec!["multipack", "start", "--compiler-command", "bundler --watch"];
        argv.extend_from_slice(extra);
        match Cli::try_parse_from(argv).unwrap().command {
            Commands::Start(args) => args,
            Commands::Worker => panic!("expected start"),
        }
    }

    #[test]
    fn test_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("bundler.config.js");
        std::fs::write(&config_path, "module.exports = {};").unwrap();

        let config = start_args(&["--targets", "ios,android", "--config", config_path.to_str().unwrap()])
            .into_config()
            .unwrap();

        assert_eq!(config.targets.len(), 2);
        assert_eq!(config.targets[1].as_str(), "android");
        assert_eq!(config.mode, BackendMode::MultiProcess);
        assert_eq!(config.forward_timeout, Duration::from_secs(300));
        assert_eq!(config.hmr_path, "/__hmr");
        assert_eq!(config.output_dir, dir.path().join(".multipack"));
        assert!(!config.log_requests);
        assert_eq!(config.compiler.program, "bundler");
        assert_eq!(config.compiler.args, vec!["--watch".to_string()]);
    }

    #[test]
    fn test_verbose_implies_request_logging() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("bundler.config.js");
        std::fs::write(&config_path, "").unwrap();

        let config = start_args(&[
            "--targets",
            "ios",
            "--config",
            config_path.to_str().unwrap(),
            "--mode",
            "in-process",
            "--verbose",
        ])
        .into_config()
        .unwrap();

        assert_eq!(config.mode, BackendMode::InProcess);
        assert_eq!(config.verbosity, Verbosity::Verbose);
        assert!(config.log_requests);
    }

    #[test]
    fn test_verbose_conflicts_with_silent() {
        let result = Cli::try_parse_from([
            "multipack", "start", "--targets", "ios", "--config", "x.js", "--verbose", "--silent",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_target_rejected() {
        let err = start_args(&["--targets", "iOS", "--config", "/nonexistent.js"])
            .into_config()
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidTarget(_)));
    }

    #[test]
    fn test_missing_build_config_rejected() {
        let err = start_args(&["--targets", "ios", "--config", "/nonexistent/bundler.config.js"])
            .into_config()
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::BuildConfigNotFound(_)));
    }

    #[test]
    fn test_bad_hmr_path_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("bundler.config.js");
        std::fs::write(&config_path, "").unwrap();

        let err = start_args(&[
            "--targets",
            "ios",
            "--config",
            config_path.to_str().unwrap(),
            "--hmr-path",
            "hot",
        ])
        .into_config()
        .unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidValue { field: "hmr_path", .. }));
    }
}
