//! MonBench Report - Result Extraction
//!
//! Collects every project's artifacts under the results directory and writes
//! `results.csv`, `algorithm_results.csv`, `problems.csv` and `fastest.json`.

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use monbench_report::{aggregate, output, pipeline, stats, ReportConfig};

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "monbench_report=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting MonBench report");

    // Load configuration
    let config = ReportConfig::from_env()?;

    let collected = pipeline::collect(&config)?;
    let rows = aggregate::aggregate(&collected.records);
    let fastest = stats::analyze(&rows, config.floor_secs);

    output::log_problems(&collected.problems);

    let paths = output::write_reports(
        &config.report_dir,
        &collected.records,
        &rows,
        &config.algorithms,
        &collected.problems,
        &fastest,
    )?;

    tracing::info!(
        records = collected.records.len(),
        projects = rows.len(),
        eligible = fastest.eligible_projects,
        problems = collected.problems.len(),
        results = %paths.results.display(),
        aggregated = %paths.aggregated.display(),
        "MonBench report finished"
    );
    Ok(())
}
