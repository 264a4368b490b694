//! MonBench Runner - Experiment Orchestrator
//!
//! Runs every (project revision, algorithm set) task in its own container
//! and keeps `runs.csv` current while the pool drains.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use monbench_runner::container::DockerLauncher;
use monbench_runner::planner::{self, ArtifactLayout};
use monbench_runner::{ContainerRunner, RunStatusStore, RunnerConfig, Scheduler};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "monbench_runner=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting MonBench runner");

    // Load configuration
    let config = RunnerConfig::from_env()?;

    let projects = planner::read_projects(&config.projects_csv)?;
    let tasks = planner::expand(&projects, &config.algorithms, config.batch_algorithms);
    tracing::info!(
        projects = projects.len(),
        tasks = tasks.len(),
        concurrency = config.max_concurrent,
        timeout_secs = config.timeout_secs,
        "Planned experiment"
    );

    // Fresh run: stale rows from a previous run are dropped
    let store = Arc::new(
        RunStatusStore::reset(&config.runs_csv)
            .with_context(|| format!("Could not reset {}", config.runs_csv.display()))?,
    );

    let layout = ArtifactLayout {
        root: config.results_dir.clone(),
        split: !config.batch_algorithms,
    };
    let runner = Arc::new(ContainerRunner::new(
        store.clone(),
        Arc::new(DockerLauncher::new(config.docker.clone())),
        layout,
        config.timeout_secs,
        Duration::from_secs(config.timeout_secs + config.timeout_grace_secs),
    ));

    // Create shutdown signal
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();

    // Ctrl+C stops dispatching; running containers finish or time out
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown signal received, draining running tasks...");
            shutdown_clone.store(true, Ordering::SeqCst);
        }
    });

    let scheduler = Scheduler::new(config.max_concurrent, shutdown)?;
    let summary = scheduler.run_all(runner, tasks).await;

    tracing::info!(
        runs_csv = %store.path().display(),
        done = summary.done,
        failed = summary.failed,
        timeout = summary.timeout,
        exception = summary.exception,
        skipped = summary.skipped,
        "MonBench runner finished"
    );
    Ok(())
}
