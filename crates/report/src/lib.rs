//! MonBench report - turns experiment artifacts into comparable results
//!
//! Reads the artifacts every task left in its results directory, checks each
//! instrumented variant against the uninstrumented baseline, and writes the
//! per-run, per-project and fastest-algorithm reports.

pub mod aggregate;
pub mod artifacts;
pub mod baseline;
pub mod config;
pub mod output;
pub mod pipeline;
pub mod problems;
pub mod pymon;
pub mod record;
pub mod stats;
pub mod summary;
pub mod units;

pub use config::ReportConfig;
pub use problems::{ProblemEntry, ProblemKind, ProblemsCollector};
pub use record::{Count, MetricRecord};
