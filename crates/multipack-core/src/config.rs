//! Dev server configuration.
//!
//! The configuration is assembled by the CLI, validated once at startup and
//! serialised as JSON into the environment of every spawned worker.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;
use crate::target::Target;

/// Environment variable carrying the serialised [`WorkerConfig`].
pub const CONFIG_ENV_KEY: &str = "MULTIPACK_WORKER_CONFIG";
/// Environment variable marking a process as a worker.
pub const WORKER_ENV_KEY: &str = "MULTIPACK_WORKER";
/// Environment variable enabling verbose output in workers.
pub const VERBOSE_ENV_KEY: &str = "MULTIPACK_VERBOSE";
/// Interface workers bind and the gateway forwards to.
pub const WORKER_HOST: &str = "127.0.0.1";

/// Default HTTP port of the gateway.
pub const DEFAULT_PORT: u16 = 8081;
/// Default forwarding timeout; first builds of large apps are slow.
pub const DEFAULT_FORWARD_TIMEOUT: Duration = Duration::from_secs(5 * 60);
/// Default grace period before stragglers are force-killed.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);
/// Default live-update path.
pub const DEFAULT_HMR_PATH: &str = "/__hmr";

/// How build backends are deployed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendMode {
    /// One isolated worker process per target, requests forwarded over HTTP.
    #[default]
    MultiProcess,
    /// A single aggregated backend inside the gateway process.
    InProcess,
}

/// Console verbosity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    Silent,
    #[default]
    Normal,
    Verbose,
}

/// External bundler invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilerCommand {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl CompilerCommand {
    /// Split a shell-like command line on whitespace.
    pub fn parse(line: &str) -> Result<Self, ConfigurationError> {
        let mut parts = line.split_whitespace().map(str::to_string);
        let program = parts.next().ok_or(ConfigurationError::EmptyCompilerCommand)?;
        Ok(Self {
            program,
            args: parts.collect(),
        })
    }
}

/// How the orchestrator launches workers.
///
/// Defaults to the running executable with the hidden `worker` subcommand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerCommand {
    pub program: PathBuf,
    #[serde(default)]
    pub args: Vec<String>,
}

impl WorkerCommand {
    /// Re-invoke the current executable in worker mode.
    pub fn current_exe() -> Result<Self, ConfigurationError> {
        let program = std::env::current_exe()
            .map_err(|e| ConfigurationError::WorkerEnvironment(e.to_string()))?;
        Ok(Self {
            program,
            args: vec!["worker".to_string()],
        })
    }
}

/// Complete dev server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DevServerConfig {
    pub host: String,
    pub port: u16,
    pub targets: Vec<Target>,
    pub build_config_path: PathBuf,
    pub mode: BackendMode,
    pub compiler: CompilerCommand,
    pub output_dir: PathBuf,
    #[serde(with = "duration_secs")]
    pub forward_timeout: Duration,
    #[serde(with = "duration_secs")]
    pub shutdown_grace: Duration,
    pub hmr_path: String,
    pub log_file: Option<PathBuf>,
    pub json: bool,
    pub verbosity: Verbosity,
    pub log_requests: bool,
}

impl DevServerConfig {
    /// Configuration with defaults for everything but the required fields.
    pub fn new(
        targets: Vec<Target>,
        build_config_path: impl Into<PathBuf>,
        compiler: CompilerCommand,
    ) -> Self {
        let build_config_path = build_config_path.into();
        let output_dir = default_output_dir(&build_config_path);
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            targets,
            build_config_path,
            mode: BackendMode::default(),
            compiler,
            output_dir,
            forward_timeout: DEFAULT_FORWARD_TIMEOUT,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            hmr_path: DEFAULT_HMR_PATH.to_string(),
            log_file: None,
            json: false,
            verbosity: Verbosity::default(),
            log_requests: false,
        }
    }

    /// Validate everything that must hold before the server binds.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.targets.is_empty() {
            return Err(ConfigurationError::NoTargets);
        }
        if !self.build_config_path.is_file() {
            return Err(ConfigurationError::BuildConfigNotFound(
                self.build_config_path.clone(),
            ));
        }
        if self.compiler.program.trim().is_empty() {
            return Err(ConfigurationError::EmptyCompilerCommand);
        }
        if !self.hmr_path.starts_with('/') {
            return Err(ConfigurationError::InvalidValue {
                field: "hmr_path",
                reason: format!("{:?} must start with '/'", self.hmr_path),
            });
        }
        if self.forward_timeout.is_zero() {
            return Err(ConfigurationError::InvalidValue {
                field: "forward_timeout",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Whether debug output is enabled.
    pub fn is_verbose(&self) -> bool {
        self.verbosity == Verbosity::Verbose
    }
}

/// Build artifacts land next to the bundler config by default.
fn default_output_dir(build_config_path: &Path) -> PathBuf {
    build_config_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(".multipack")
}

/// Configuration handed to a single worker process.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerConfig {
    pub server: DevServerConfig,
    pub target: Target,
    pub port: u16,
}

impl WorkerConfig {
    /// Serialise for the worker environment.
    pub fn to_env_value(&self) -> Result<String, ConfigurationError> {
        serde_json::to_string(self).map_err(|e| ConfigurationError::WorkerEnvironment(e.to_string()))
    }

    /// Read the configuration from the worker environment.
    pub fn from_env() -> Result<Self, ConfigurationError> {
        let raw = std::env::var(CONFIG_ENV_KEY).map_err(|_| {
            ConfigurationError::WorkerEnvironment(format!("{CONFIG_ENV_KEY} is not set"))
        })?;
        Self::from_env_value(&raw)
    }

    /// Parse a serialised configuration.
    pub fn from_env_value(raw: &str) -> Result<Self, ConfigurationError> {
        serde_json::from_str(raw).map_err(|e| ConfigurationError::WorkerEnvironment(e.to_string()))
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
