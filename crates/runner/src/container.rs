//! Container invocation for experiment tasks.
//!
//! Each task runs in a fresh container of the pre-built experiment image.
//! The task's artifact directory is bind-mounted so the test run inside the
//! container can write its reports, and the container is torn down on exit.

use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;

use monbench_common::{BenchError, BenchResult, Task};

use crate::config::DockerConfig;

/// Builds the external process for one task.
///
/// The orchestrator owns spawning, waiting and killing; implementors only
/// describe what to run.
pub trait Launcher: Send + Sync {
    /// Process that executes `task`, writing artifacts into `artifact_dir`
    fn command(&self, task: &Task, artifact_dir: &Path, timeout_secs: u64) -> BenchResult<Command>;

    /// Optional cleanup run after a timed-out process has been killed
    fn teardown(&self, _task: &Task) -> Option<Command> {
        None
    }
}

/// Launches tasks through the docker CLI
#[derive(Debug, Clone)]
pub struct DockerLauncher {
    config: DockerConfig,
}

impl DockerLauncher {
    pub fn new(config: DockerConfig) -> Self {
        Self { config }
    }

    /// Deterministic container name so a timed-out container can be removed
    pub fn container_name(task: &Task) -> String {
        let raw = format!(
            "monbench-{}-{}-{}",
            task.project_name(),
            monbench_common::short_sha(&task.sha),
            task.algorithms.label().replace('+', "plus").replace(' ', "_")
        );
        raw.chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
                    c
                } else {
                    '_'
                }
            })
            .collect()
    }

    /// Arguments after the CLI binary
    pub fn run_args(&self, task: &Task, mount_source: &Path, timeout_secs: u64) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "run".into(),
            "--rm".into(),
            "--name".into(),
            Self::container_name(task),
        ];

        // ── Volume: artifact directory → results mount ───────
        args.push("-v".into());
        args.push(format!(
            "{}:{}",
            mount_source.display(),
            self.config.results_mount
        ));

        // ── Forwarded credentials (by name only) ─────────────
        for name in &self.config.forward_env {
            args.push("-e".into());
            args.push(name.clone());
        }

        // ── Image and experiment arguments ───────────────────
        args.push(self.config.image.clone());
        args.push(task.link.clone());
        args.push(task.sha.clone());
        args.push(timeout_secs.to_string());
        args.push(task.algorithms.label());

        args
    }
}

impl Launcher for DockerLauncher {
    fn command(&self, task: &Task, artifact_dir: &Path, timeout_secs: u64) -> BenchResult<Command> {
        let mount_source = artifact_dir.canonicalize().map_err(|e| {
            BenchError::Launch(format!(
                "could not canonicalize {}: {}",
                artifact_dir.display(),
                e
            ))
        })?;

        let args = self.run_args(task, &mount_source, timeout_secs);
        tracing::debug!(
            image = %self.config.image,
            project = %task.project_name(),
            args = ?args,
            "Spawning experiment container"
        );

        let mut cmd = Command::new(&self.config.bin);
        cmd.args(&args).stdin(Stdio::null());
        Ok(cmd)
    }

    fn teardown(&self, task: &Task) -> Option<Command> {
        let name = Self::container_name(task);
        let mut cmd = Command::new(&self.config.bin);
        cmd.args(["rm", "-f", name.as_str()])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        Some(cmd)
    }
}
