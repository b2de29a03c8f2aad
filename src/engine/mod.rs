//! External analysis engine.
//!
//! The gateway never computes anything itself: it hands a script and a list
//! of arguments to the engine program (normally `Rscript`) and waits.

pub mod invocation;
pub mod scripts;

pub use invocation::{Invocation, ScriptKind};

use crate::error::{GatewayError, Result};
use anyhow::Context;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, error, info, warn};

/// Engine settings resolved from configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Program used to run scripts.
    pub program: String,
    /// Directory searched for pre-authored scripts.
    pub scripts_dir: PathBuf,
    /// Timeout applied to every invocation unless overridden.
    pub timeout: Option<Duration>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            program: "Rscript".to_string(),
            scripts_dir: PathBuf::from("rcode"),
            timeout: Some(Duration::from_secs(1800)),
        }
    }
}

/// Captured output of a successful run.
#[derive(Debug, Clone, Default)]
pub struct EngineOutput {
    pub stdout: String,
}

/// Runs scripts as child processes.
#[derive(Debug, Clone)]
pub struct Engine {
    config: EngineConfig,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Run with the configured default timeout.
    pub async fn run(&self, invocation: &Invocation) -> Result<EngineOutput> {
        self.run_with_timeout(invocation, self.config.timeout).await
    }

    /// Run with an explicit timeout (`None` waits indefinitely).
    pub async fn run_with_timeout(
        &self,
        invocation: &Invocation,
        timeout: Option<Duration>,
    ) -> Result<EngineOutput> {
        let script = scripts::resolve(&self.config.scripts_dir, invocation.kind)?;
        let result = self.execute(script.path(), invocation, timeout).await;

        if let Err(e) = script.cleanup() {
            warn!("Failed to remove temporary script: {}", e);
        }

        result
    }

    async fn execute(
        &self,
        script: &std::path::Path,
        invocation: &Invocation,
        timeout: Option<Duration>,
    ) -> Result<EngineOutput> {
        info!("Running {} via {}", invocation.kind, self.config.program);
        debug!("Engine arguments: {:?}", invocation.args);

        let child = Command::new(&self.config.program)
            .arg(script)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to start engine '{}'", self.config.program))?;

        let started = Instant::now();
        let waited = child.wait_with_output();

        // Dropping the pending wait drops the child, which kills it.
        let output = match timeout {
            Some(limit) => match tokio::time::timeout(limit, waited).await {
                Ok(output) => output,
                Err(_) => {
                    error!(
                        "{} exceeded {}s timeout, killed",
                        invocation.kind,
                        limit.as_secs()
                    );
                    return Err(GatewayError::Timeout {
                        seconds: limit.as_secs(),
                    });
                }
            },
            None => waited.await,
        }
        .context("Failed to wait for engine process")?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            error!(
                "{} failed ({}) after {:.1}s",
                invocation.kind,
                output.status,
                started.elapsed().as_secs_f64()
            );
            return Err(GatewayError::engine(stderr));
        }

        info!(
            "{} finished in {:.1}s",
            invocation.kind,
            started.elapsed().as_secs_f64()
        );
        // R writes package start-up chatter and warnings here.
        if !stderr.trim().is_empty() {
            debug!("{} stderr:\n{}", invocation.kind, stderr.trim_end());
        }
        Ok(EngineOutput { stdout })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::test_utils::FakeEngine;

    #[tokio::test]
    async fn test_success_keeps_stderr_out_of_stdout() {
        let fake = FakeEngine::new();
        fake.script(
            ScriptKind::Heatmap,
            r#"echo "out:$1:$2"; echo "warn" >&2"#,
        );

        let inv = Invocation::new(ScriptKind::Heatmap)
            .text("a")
            .unwrap()
            .text("b c")
            .unwrap();
        let out = fake.engine().run(&inv).await.unwrap();
        assert_eq!(out.stdout, "out:a:b c\n");
    }

    #[tokio::test]
    async fn test_nonzero_exit_surfaces_stderr_verbatim() {
        let fake = FakeEngine::new();
        fake.script(
            ScriptKind::Pca,
            "echo 'Error in read_csv(): file missing' >&2; exit 3",
        );

        let err = fake
            .engine()
            .run(&Invocation::new(ScriptKind::Pca))
            .await
            .unwrap_err();
        match err {
            GatewayError::EngineFailure { detail } => {
                assert_eq!(detail, "Error in read_csv(): file missing\n")
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_timeout_kills_child() {
        let fake = FakeEngine::new();
        let marker = fake.dir().join("finished");
        fake.script(
            ScriptKind::EnrichGo,
            &format!("sleep 2; touch '{}'", marker.display()),
        );

        let err = fake
            .engine()
            .run_with_timeout(
                &Invocation::new(ScriptKind::EnrichGo),
                Some(Duration::from_millis(200)),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Timeout { .. }));

        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert!(!marker.exists(), "child survived the timeout");
    }

    #[tokio::test]
    async fn test_embedded_script_is_removed_after_run() {
        let fake = FakeEngine::new();
        let engine = Engine::new(EngineConfig {
            program: "sh".to_string(),
            scripts_dir: fake.dir().join("missing"),
            timeout: Some(Duration::from_secs(10)),
        });
        let count = || {
            std::fs::read_dir(std::env::temp_dir())
                .unwrap()
                .flatten()
                .filter(|e| {
                    e.file_name()
                        .to_string_lossy()
                        .starts_with("omicsgw-run_string-")
                })
                .count()
        };

        let before = count();
        // `sh` rejects the R body; the temp copy must still go away.
        let result = engine.run(&Invocation::new(ScriptKind::StringNetwork)).await;
        assert!(matches!(result, Err(GatewayError::EngineFailure { .. })));
        assert_eq!(count(), before);
    }

    #[tokio::test]
    async fn test_missing_program_is_internal() {
        let engine = Engine::new(EngineConfig {
            program: "/nonexistent/omicsgw-engine".to_string(),
            scripts_dir: PathBuf::from("/nonexistent"),
            timeout: None,
        });
        let err = engine
            .run(&Invocation::new(ScriptKind::Heatmap))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Internal(_)));
    }
}
