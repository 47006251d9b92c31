//! `Compiler` adapter over an external bundler command.
//!
//! The bundler runs in watch mode, one process per target. It receives
//! its target, output directory and config path through the environment and
//! writes one JSON `CompilerEvent` per stdout line. Artifacts are read from
//! `<output_dir>/<target>/<name>`.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use multipack_core::{
    Compiler, CompilerCommand, CompilerError, CompilerEvent, LogType, Target,
};
use tokio::process::{Child, Command};
use tokio::sync::{Mutex, mpsc};
use tokio::sync::mpsc::WeakUnboundedSender;
use tracing::debug;

use crate::logger::Logger;
use crate::process::{shutdown_child, spawn_line_reader};

/// Environment variable naming the target being built.
pub const TARGET_ENV_KEY: &str = "MULTIPACK_TARGET";
/// Environment variable naming the artifact directory of the target.
pub const OUTPUT_DIR_ENV_KEY: &str = "MULTIPACK_OUTPUT_DIR";
/// Environment variable naming the bundler configuration file.
pub const BUILD_CONFIG_ENV_KEY: &str = "MULTIPACK_BUILD_CONFIG";

/// Runs the configured bundler command per target.
#[derive(Debug)]
pub struct CommandCompiler {
    command: CompilerCommand,
    build_config_path: PathBuf,
    output_dir: PathBuf,
    shutdown_grace: Duration,
    logger: Logger,
    children: Mutex<HashMap<Target, Watcher>>,
}

/// A bundler process and a handle that dies with its event stream.
#[derive(Debug)]
struct Watcher {
    child: Child,
    events: WeakUnboundedSender<CompilerEvent>,
}

impl CommandCompiler {
    pub fn new(
        command: CompilerCommand,
        build_config_path: PathBuf,
        output_dir: PathBuf,
        shutdown_grace: Duration,
        logger: Logger,
    ) -> Self {
        Self {
            command,
            build_config_path,
            output_dir,
            shutdown_grace,
            logger,
            children: Mutex::new(HashMap::new()),
        }
    }

    /// Artifact directory of `target`.
    pub fn target_dir(&self, target: &Target) -> PathBuf {
        self.output_dir.join(target.as_str())
    }
}

/// Reject names that would escape the artifact directory.
fn safe_relative(name: &str) -> Option<&Path> {
    let path = Path::new(name);
    path.components()
        .all(|c| matches!(c, Component::Normal(_)))
        .then_some(path)
}

fn log_type_for(level: &str) -> LogType {
    match level {
        "debug" | "verbose" | "trace" => LogType::Debug,
        "warn" | "warning" => LogType::Warn,
        "error" => LogType::Error,
        _ => LogType::Info,
    }
}

#[async_trait]
impl Compiler for CommandCompiler {
    async fn watch(
        &self,
        target: &Target,
    ) -> Result<mpsc::UnboundedReceiver<CompilerEvent>, CompilerError> {
        let start_failed = |reason: String| CompilerError::StartFailed {
            target: target.clone(),
            reason,
        };

        let mut children = self.children.lock().await;
        if let Some(previous) = children.remove(target) {
            if previous.events.upgrade().is_some() {
                children.insert(target.clone(), previous);
                return Err(start_failed("already watching".to_string()));
            }
            // Its stream ended: replace it.
            if let Err(e) = shutdown_child(previous.child, self.shutdown_grace).await {
                debug!(target = %target, error = %e, "Failed to stop previous compiler");
            }
        }

        let target_dir = self.target_dir(target);
        tokio::fs::create_dir_all(&target_dir)
            .await
            .map_err(|e| start_failed(e.to_string()))?;

        let mut child = Command::new(&self.command.program)
            .args(&self.command.args)
            .env(TARGET_ENV_KEY, target.as_str())
            .env(OUTPUT_DIR_ENV_KEY, &target_dir)
            .env(BUILD_CONFIG_ENV_KEY, &self.build_config_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| start_failed(e.to_string()))?;

        let (tx, rx) = mpsc::unbounded_channel();
        let events = tx.downgrade();
        let issuer = format!("Compiler({target})");

        if let Some(stdout) = child.stdout.take() {
            let logger = self.logger.with_issuer(&issuer);
            spawn_line_reader(stdout, format!("{target}:compiler"), move |line| {
                match serde_json::from_str::<CompilerEvent>(&line) {
                    Ok(event) => {
                        if tx.send(event).is_err() {
                            debug!("Compiler event consumer gone");
                        }
                    }
                    Err(_) => logger.info(&line, None),
                }
            });
        }
        if let Some(stderr) = child.stderr.take() {
            let logger = self.logger.with_issuer(&issuer);
            spawn_line_reader(stderr, format!("{target}:compiler-stderr"), move |line| {
                logger.warn(&line, None);
            });
        }

        children.insert(target.clone(), Watcher { child, events });
        Ok(rx)
    }

    async fn read_asset(&self, target: &Target, name: &str) -> Result<Option<Bytes>, CompilerError> {
        let Some(relative) = safe_relative(name) else {
            return Ok(None);
        };
        let path = self.target_dir(target).join(relative);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(Bytes::from(bytes))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CompilerError::ReadFailed {
                target: target.clone(),
                name: name.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    async fn stop(&self) {
        let watchers: Vec<(Target, Watcher)> = self.children.lock().await.drain().collect();
        for (target, watcher) in watchers {
            if let Err(e) = shutdown_child(watcher.child, self.shutdown_grace).await {
                debug!(target = %target, error = %e, "Failed to stop compiler");
            }
        }
    }
}

/// Translate a bundler `log` event into a reporter call.
pub fn log_compiler_message(logger: &Logger, level: &str, message: &str) {
    logger.log(log_type_for(level), message, None);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn compiler(dir: &Path, script: &str) -> CommandCompiler {
        CommandCompiler::new(
            CompilerCommand {
                program: "sh".into(),
                args: vec!["-c".into(), script.into()],
            },
            dir.join("bundler.config.js"),
            dir.join("out"),
            Duration::from_secs(1),
            Logger::noop(),
        )
    }

    #[test]
    fn test_safe_relative() {
        assert!(safe_relative("index.ios.bundle").is_some());
        assert!(safe_relative("assets/logo.png").is_some());
        assert!(safe_relative("../secret").is_none());
        assert!(safe_relative("/etc/passwd").is_none());
    }

    #[test]
    fn test_log_levels() {
        assert_eq!(log_type_for("warning"), LogType::Warn);
        assert_eq!(log_type_for("error"), LogType::Error);
        assert_eq!(log_type_for("verbose"), LogType::Debug);
        assert_eq!(log_type_for("whatever"), LogType::Info);
    }

    #[tokio::test]
    async fn test_read_asset_from_target_dir() {
        let dir = TempDir::new().unwrap();
        let compiler = compiler(dir.path(), "true");
        let ios = Target::new("ios").unwrap();
        std::fs::create_dir_all(compiler.target_dir(&ios)).unwrap();
        std::fs::write(compiler.target_dir(&ios).join("index.bundle"), "code").unwrap();

        let bytes = compiler.read_asset(&ios, "index.bundle").await.unwrap();
        assert_eq!(bytes.unwrap(), Bytes::from_static(b"code"));
        assert!(compiler.read_asset(&ios, "missing.js").await.unwrap().is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_watch_streams_events_in_order() {
        let dir = TempDir::new().unwrap();
        let script = r#"
            echo "target=$MULTIPACK_TARGET" > "$MULTIPACK_OUTPUT_DIR/env.txt"
            echo '{"event":"watch_run"}'
            echo 'plain bundler chatter'
            echo '{"event":"compile"}'
            echo '{"event":"done","hash":"abc","time":5}'
            exec sleep 30
        "#;
        let compiler = compiler(dir.path(), script);
        let ios = Target::new("ios").unwrap();

        let mut rx = compiler.watch(&ios).await.unwrap();
        assert_eq!(rx.recv().await, Some(CompilerEvent::WatchRun));
        assert_eq!(rx.recv().await, Some(CompilerEvent::Compile));
        assert!(matches!(
            rx.recv().await,
            Some(CompilerEvent::Done { ref hash, time: 5, .. }) if hash == "abc"
        ));

        let env = compiler.read_asset(&ios, "env.txt").await.unwrap().unwrap();
        assert_eq!(env, Bytes::from_static(b"target=ios\n"));

        assert!(compiler.watch(&ios).await.is_err());
        compiler.stop().await;
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_watch_restarts_after_stream_ends() {
        let dir = TempDir::new().unwrap();
        let marker = dir.path().join("started-once");
        let script = format!(
            r#"if [ -f '{m}' ]; then echo '{{"event":"compile"}}'; exec sleep 30; fi
            touch '{m}'
            echo '{{"event":"watch_run"}}'"#,
            m = marker.display()
        );
        let compiler = compiler(dir.path(), &script);
        let ios = Target::new("ios").unwrap();

        let mut first = compiler.watch(&ios).await.unwrap();
        assert_eq!(first.recv().await, Some(CompilerEvent::WatchRun));
        assert_eq!(first.recv().await, None);

        let mut second = compiler.watch(&ios).await.unwrap();
        assert_eq!(second.recv().await, Some(CompilerEvent::Compile));
        compiler.stop().await;
    }
}
