//! Bounded worker pool that dispatches tasks

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tokio::sync::Semaphore;

use monbench_common::{BenchError, BenchResult, RunStatus, Task};

use crate::executor::{TaskHandler, TaskOutcome};

/// Read-only view of the progress counters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSnapshot {
    pub total: usize,
    pub started: usize,
    pub finished: usize,
    /// Sum of elapsed seconds over finished tasks
    pub total_elapsed: f64,
}

impl ProgressSnapshot {
    /// Average seconds per finished task
    pub fn average(&self) -> Option<f64> {
        (self.finished > 0).then(|| self.total_elapsed / self.finished as f64)
    }

    /// Naive estimate: average × tasks not yet finished
    pub fn estimated_remaining(&self) -> Option<f64> {
        self.average()
            .map(|avg| avg * self.total.saturating_sub(self.finished) as f64)
    }
}

#[derive(Default)]
struct Counters {
    started: usize,
    finished: usize,
    total_elapsed: f64,
}

/// Tasks started and cumulative elapsed time, shared by all workers
pub struct Progress {
    total: usize,
    counters: Mutex<Counters>,
}

impl Progress {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            counters: Mutex::new(Counters::default()),
        }
    }

    fn record_start(&self) -> ProgressSnapshot {
        let mut counters = self.counters.lock().unwrap_or_else(|p| p.into_inner());
        counters.started += 1;
        self.snapshot_of(&counters)
    }

    fn record_finish(&self, elapsed: f64) -> ProgressSnapshot {
        let mut counters = self.counters.lock().unwrap_or_else(|p| p.into_inner());
        counters.finished += 1;
        counters.total_elapsed += elapsed.max(0.0);
        self.snapshot_of(&counters)
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        let counters = self.counters.lock().unwrap_or_else(|p| p.into_inner());
        self.snapshot_of(&counters)
    }

    fn snapshot_of(&self, counters: &Counters) -> ProgressSnapshot {
        ProgressSnapshot {
            total: self.total,
            started: counters.started,
            finished: counters.finished,
            total_elapsed: counters.total_elapsed,
        }
    }
}

/// Terminal status counts for a whole run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub done: usize,
    pub failed: usize,
    pub timeout: usize,
    pub exception: usize,
    /// Tasks never dispatched because of shutdown
    pub skipped: usize,
}

impl RunSummary {
    fn record(&mut self, status: RunStatus) {
        match status {
            RunStatus::Done => self.done += 1,
            RunStatus::Failed => self.failed += 1,
            RunStatus::Timeout => self.timeout += 1,
            RunStatus::Exception | RunStatus::Running => self.exception += 1,
        }
    }
}

/// Runs at most `concurrency` tasks at once; no retries
pub struct Scheduler {
    concurrency: usize,
    shutdown: Arc<AtomicBool>,
}

impl Scheduler {
    pub fn new(concurrency: usize, shutdown: Arc<AtomicBool>) -> BenchResult<Self> {
        if concurrency == 0 {
            return Err(BenchError::InvalidConcurrency(concurrency));
        }
        Ok(Self {
            concurrency,
            shutdown,
        })
    }

    /// Dispatch every task and wait for all of them.
    ///
    /// A task is submitted only once a worker slot is free, so submission
    /// order is start order. Completion order is unspecified.
    pub async fn run_all<H: TaskHandler>(&self, handler: Arc<H>, tasks: Vec<Task>) -> RunSummary {
        let progress = Arc::new(Progress::new(tasks.len()));
        self.run_with_progress(handler, tasks, progress).await
    }

    async fn run_with_progress<H: TaskHandler>(
        &self,
        handler: Arc<H>,
        tasks: Vec<Task>,
        progress: Arc<Progress>,
    ) -> RunSummary {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut summary = RunSummary::default();
        let mut handles = Vec::with_capacity(tasks.len());

        let total = tasks.len();
        for (submitted, task) in tasks.into_iter().enumerate() {
            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };
            if self.shutdown.load(Ordering::SeqCst) {
                tracing::warn!("Shutdown requested, not dispatching remaining tasks");
                summary.skipped = total - submitted;
                break;
            }

            let snapshot = progress.record_start();
            log_start(&task, &snapshot);

            let handler = handler.clone();
            let progress = progress.clone();
            let key = task.key();
            let dispatched = Instant::now();
            let handle = tokio::spawn(async move {
                let _permit = permit;
                let outcome = handler.handle(&task).await;
                progress.record_finish(outcome.elapsed);
                outcome
            });
            handles.push(((key, dispatched), handle));
        }

        let (keys, handles): (Vec<_>, Vec<_>) = handles.into_iter().unzip();
        let results = futures::future::join_all(handles).await;

        for ((key, dispatched), result) in keys.into_iter().zip(results) {
            match result {
                Ok(TaskOutcome { status, .. }) => summary.record(status),
                Err(e) => {
                    // the worker never reached record_finish
                    progress.record_finish(dispatched.elapsed().as_secs_f64());
                    tracing::error!(
                        link = %key.link,
                        algorithms = %key.algorithms,
                        "Task worker aborted: {}",
                        e
                    );
                    summary.record(RunStatus::Exception);
                }
            }
        }

        let snapshot = progress.snapshot();
        tracing::info!(
            done = summary.done,
            failed = summary.failed,
            timeout = summary.timeout,
            exception = summary.exception,
            skipped = summary.skipped,
            total_time = snapshot.total_elapsed,
            "All tasks drained"
        );
        summary
    }
}

fn log_start(task: &Task, snapshot: &ProgressSnapshot) {
    tracing::info!(
        "Running {}/{}: {} with sha {} and algorithms {}",
        snapshot.started,
        snapshot.total,
        task.link,
        task.sha,
        task.algorithms
    );
    if let (Some(average), Some(remaining)) = (snapshot.average(), snapshot.estimated_remaining()) {
        tracing::info!(
            total_time = snapshot.total_elapsed,
            average_per_task = average,
            estimated_remaining = remaining,
            "Progress"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use async_trait::async_trait;
    use monbench_common::{Algorithm, AlgorithmSet};

    /// Tracks the highest number of tasks in flight at once
    #[derive(Default)]
    struct CountingHandler {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        handled: AtomicUsize,
    }

    #[async_trait]
    impl TaskHandler for CountingHandler {
        async fn handle(&self, task: &Task) -> TaskOutcome {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.handled.fetch_add(1, Ordering::SeqCst);
            TaskOutcome {
                key: task.key(),
                status: RunStatus::Done,
                elapsed: 0.02,
                message: None,
            }
        }
    }

    /// Panics on the project named "boom", fails on odd-numbered projects
    struct FlakyHandler;

    #[async_trait]
    impl TaskHandler for FlakyHandler {
        async fn handle(&self, task: &Task) -> TaskOutcome {
            if task.project_name() == "boom" {
                panic!("worker exploded");
            }
            let n: usize = task.project_name().trim_start_matches('p').parse().unwrap_or(0);
            TaskOutcome {
                key: task.key(),
                status: if n % 2 == 1 { RunStatus::Failed } else { RunStatus::Done },
                elapsed: 1.0,
                message: None,
            }
        }
    }

    fn tasks(n: usize) -> Vec<Task> {
        (0..n)
            .map(|i| {
                Task::new(
                    format!("https://github.com/org/p{i}"),
                    "abcdef0123",
                    AlgorithmSet::single(Algorithm::B),
                )
            })
            .collect()
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let err = Scheduler::new(0, Arc::new(AtomicBool::new(false)))
            .err()
            .unwrap();
        assert_eq!(err.error_code(), "INVALID_CONCURRENCY");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_never_exceeds_concurrency_bound() {
        let scheduler = Scheduler::new(3, Arc::new(AtomicBool::new(false))).unwrap();
        let handler = Arc::new(CountingHandler::default());

        let summary = scheduler.run_all(handler.clone(), tasks(12)).await;

        assert_eq!(summary.done, 12);
        assert_eq!(handler.handled.load(Ordering::SeqCst), 12);
        assert!(handler.peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_panicking_task_does_not_block_others() {
        let scheduler = Scheduler::new(2, Arc::new(AtomicBool::new(false))).unwrap();
        let mut all = tasks(4);
        all.insert(
            1,
            Task::new(
                "https://github.com/org/boom",
                "abcdef0123",
                AlgorithmSet::single(Algorithm::B),
            ),
        );

        let progress = Arc::new(Progress::new(all.len()));
        let summary = scheduler
            .run_with_progress(Arc::new(FlakyHandler), all, progress.clone())
            .await;

        assert_eq!(summary.exception, 1);
        assert_eq!(summary.done, 2);
        assert_eq!(summary.failed, 2);

        let snapshot = progress.snapshot();
        assert_eq!(snapshot.started, 5);
        assert_eq!(snapshot.finished, 5);
        assert_eq!(snapshot.estimated_remaining(), Some(0.0));
    }

    #[tokio::test]
    async fn test_shutdown_stops_dispatch() {
        let scheduler = Scheduler::new(1, Arc::new(AtomicBool::new(true))).unwrap();
        let handler = Arc::new(CountingHandler::default());

        let summary = scheduler.run_all(handler.clone(), tasks(3)).await;

        assert_eq!(summary.skipped, 3);
        assert_eq!(handler.handled.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_progress_estimates() {
        let progress = Progress::new(4);
        progress.record_start();
        progress.record_start();
        progress.record_finish(10.0);
        let snapshot = progress.record_finish(20.0);

        assert_eq!(snapshot.started, 2);
        assert_eq!(snapshot.average(), Some(15.0));
        assert_eq!(snapshot.estimated_remaining(), Some(30.0));
        assert_eq!(Progress::new(1).snapshot().average(), None);
    }
}
