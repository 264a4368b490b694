//! MonBench runner - concurrent experiment orchestration
//!
//! Expands a project list into tasks, runs each task in an isolated
//! container under a bounded concurrency limit with a hard timeout, and
//! records every task's status in a shared `runs.csv`.

pub mod config;
pub mod container;
pub mod executor;
pub mod planner;
pub mod scheduler;
pub mod store;

pub use config::RunnerConfig;
pub use executor::{ContainerRunner, TaskHandler, TaskOutcome};
pub use scheduler::{RunSummary, Scheduler};
pub use store::{RunStatusRecord, RunStatusStore};
