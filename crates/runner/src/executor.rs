//! Time-bounded execution of a single task

use std::fs::File;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use monbench_common::{BenchError, BenchResult, RunStatus, Task, TaskKey};

use crate::container::Launcher;
use crate::planner::ArtifactLayout;
use crate::store::{RunStatusStore, ELAPSED_UNSET};

/// Captured container output, next to the artifacts
pub const CONTAINER_LOG: &str = "container.log";

/// Terminal result of one task
#[derive(Debug, Clone)]
pub struct TaskOutcome {
    pub key: TaskKey,
    pub status: RunStatus,
    /// Seconds from dispatch to terminal status, two decimals
    pub elapsed: f64,
    pub message: Option<String>,
}

/// Anything the scheduler can dispatch a task to
#[async_trait]
pub trait TaskHandler: Send + Sync + 'static {
    async fn handle(&self, task: &Task) -> TaskOutcome;
}

/// Records Running on creation and exactly one terminal status afterwards.
///
/// If the guard is dropped before `finish` (early return, panic unwinding
/// through the task) it records Exception itself. That write happens inline
/// in `drop`; the regular path writes on the blocking pool.
struct StatusGuard {
    store: Arc<RunStatusStore>,
    key: TaskKey,
    started: Instant,
    finished: bool,
}

impl StatusGuard {
    async fn begin(store: Arc<RunStatusStore>, key: TaskKey) -> Self {
        let started = Instant::now();
        if let Err(e) = store
            .clone()
            .upsert_blocking(key.clone(), RunStatus::Running, ELAPSED_UNSET)
            .await
        {
            tracing::error!(link = %key.link, "Could not record running status: {}", e);
        }
        Self {
            store,
            key,
            started,
            finished: false,
        }
    }

    fn elapsed(&self) -> f64 {
        round2(self.started.elapsed().as_secs_f64())
    }

    async fn finish(mut self, status: RunStatus) -> f64 {
        let elapsed = self.elapsed();
        let written = self
            .store
            .clone()
            .upsert_blocking(self.key.clone(), status, elapsed)
            .await;
        self.finished = true;
        if let Err(e) = written {
            self.log_write_error(status, &e);
        }
        elapsed
    }

    fn log_write_error(&self, status: RunStatus, err: &BenchError) {
        tracing::error!(
            link = %self.key.link,
            status = %status,
            "Could not record terminal status: {}",
            err
        );
    }
}

impl Drop for StatusGuard {
    fn drop(&mut self) {
        if !self.finished {
            let elapsed = self.elapsed();
            if let Err(e) = self.store.upsert(&self.key, RunStatus::Exception, elapsed) {
                self.log_write_error(RunStatus::Exception, &e);
            }
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Executes tasks as isolated external processes with a hard timeout
pub struct ContainerRunner {
    store: Arc<RunStatusStore>,
    launcher: Arc<dyn Launcher>,
    layout: ArtifactLayout,
    /// Timeout handed to the process itself
    task_timeout_secs: u64,
    /// Wall-clock budget after which the process is killed
    hard_timeout: Duration,
}

impl ContainerRunner {
    pub fn new(
        store: Arc<RunStatusStore>,
        launcher: Arc<dyn Launcher>,
        layout: ArtifactLayout,
        task_timeout_secs: u64,
        hard_timeout: Duration,
    ) -> Self {
        Self {
            store,
            launcher,
            layout,
            task_timeout_secs,
            hard_timeout,
        }
    }

    /// Run one task. Never fails: every error becomes a terminal status.
    pub async fn run(&self, task: &Task) -> TaskOutcome {
        let key = task.key();
        let guard = StatusGuard::begin(self.store.clone(), key.clone()).await;

        let (status, message) = match self.execute(task).await {
            Ok(()) => (RunStatus::Done, None),
            Err(e @ BenchError::ProcessFailure { .. }) => (RunStatus::Failed, Some(e.to_string())),
            Err(e @ BenchError::Timeout(_)) => (RunStatus::Timeout, Some(e.to_string())),
            Err(e) => (RunStatus::Exception, Some(e.to_string())),
        };
        let elapsed = guard.finish(status).await;

        match status {
            RunStatus::Done => tracing::info!(
                project = %task.project_name(),
                algorithms = %key.algorithms,
                elapsed,
                "Task finished"
            ),
            _ => tracing::error!(
                project = %task.project_name(),
                algorithms = %key.algorithms,
                status = %status,
                elapsed,
                "Task did not complete: {}",
                message.as_deref().unwrap_or("")
            ),
        }

        TaskOutcome {
            key,
            status,
            elapsed,
            message,
        }
    }

    async fn execute(&self, task: &Task) -> BenchResult<()> {
        let artifact_dir = self.layout.dir_for(task);
        tokio::fs::create_dir_all(&artifact_dir)
            .await
            .map_err(|e| BenchError::Launch(format!("{}: {}", artifact_dir.display(), e)))?;

        let log = File::create(artifact_dir.join(CONTAINER_LOG))
            .map_err(|e| BenchError::Launch(format!("container log: {}", e)))?;
        let log_err = log
            .try_clone()
            .map_err(|e| BenchError::Launch(format!("container log: {}", e)))?;

        let mut cmd = self
            .launcher
            .command(task, &artifact_dir, self.task_timeout_secs)?;
        cmd.stdout(Stdio::from(log))
            .stderr(Stdio::from(log_err))
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|e| BenchError::Launch(format!("spawn failed: {}", e)))?;

        match tokio::time::timeout(self.hard_timeout, child.wait()).await {
            Ok(Ok(status)) if status.success() => Ok(()),
            Ok(Ok(status)) => Err(BenchError::ProcessFailure {
                code: status.code().unwrap_or(-1),
            }),
            Ok(Err(e)) => Err(BenchError::Launch(format!("wait failed: {}", e))),
            Err(_) => {
                if let Err(e) = child.kill().await {
                    tracing::warn!(
                        project = %task.project_name(),
                        "Failed to kill timed-out process: {}",
                        e
                    );
                }
                self.teardown(task).await;
                Err(BenchError::Timeout(self.hard_timeout.as_secs()))
            }
        }
    }

    async fn teardown(&self, task: &Task) {
        let Some(mut cmd) = self.launcher.teardown(task) else {
            return;
        };
        match cmd.status().await {
            Ok(status) if status.success() => {
                tracing::debug!(project = %task.project_name(), "Removed timed-out container")
            }
            Ok(status) => tracing::warn!(
                project = %task.project_name(),
                "Container teardown exited with {}",
                status
            ),
            Err(e) => tracing::warn!(
                project = %task.project_name(),
                "Container teardown failed: {}",
                e
            ),
        }
    }
}

#[async_trait]
impl TaskHandler for ContainerRunner {
    async fn handle(&self, task: &Task) -> TaskOutcome {
        self.run(task).await
    }
}
