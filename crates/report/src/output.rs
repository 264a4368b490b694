//! Report files and the end-of-run problem listing

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use csv::Writer;
use serde::Serialize;

use monbench_common::AlgorithmSet;

use crate::aggregate::{self, AggregatedRow};
use crate::problems::{GroupedProblems, ProblemsCollector};
use crate::record::{MetricRecord, RESULT_COLUMNS};
use crate::stats::FastestReport;

pub const RESULTS_FILE: &str = "results.csv";
pub const AGGREGATED_FILE: &str = "algorithm_results.csv";
pub const PROBLEMS_FILE: &str = "problems.csv";
pub const FASTEST_FILE: &str = "fastest.json";

/// Paths of the files written by `write_reports`
#[derive(Debug, Clone)]
pub struct ReportPaths {
    pub results: PathBuf,
    pub aggregated: PathBuf,
    pub problems: PathBuf,
    pub fastest: PathBuf,
}

impl ReportPaths {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            results: dir.join(RESULTS_FILE),
            aggregated: dir.join(AGGREGATED_FILE),
            problems: dir.join(PROBLEMS_FILE),
            fastest: dir.join(FASTEST_FILE),
        }
    }
}

#[derive(Serialize)]
struct FastestFile<'a> {
    generated_at: DateTime<Utc>,
    #[serde(flatten)]
    report: &'a FastestReport,
}

pub fn write_results(path: &Path, records: &[MetricRecord]) -> Result<()> {
    let mut wtr = Writer::from_path(path).with_context(|| format!("creating {}", path.display()))?;
    if records.is_empty() {
        wtr.write_record(RESULT_COLUMNS)?;
    }
    for record in records {
        wtr.serialize(record.to_row())?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_aggregated(
    path: &Path,
    rows: &[AggregatedRow],
    algorithms: &AlgorithmSet,
) -> Result<()> {
    let mut wtr = Writer::from_path(path).with_context(|| format!("creating {}", path.display()))?;
    wtr.write_record(aggregate::header(algorithms))?;
    for row in rows {
        wtr.write_record(row.to_record(algorithms))?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_problems(path: &Path, problems: &ProblemsCollector) -> Result<()> {
    let mut wtr = Writer::from_path(path).with_context(|| format!("creating {}", path.display()))?;
    let entries = problems.entries();
    if entries.is_empty() {
        wtr.write_record(["project", "algorithm", "kind", "problem"])?;
    }
    for entry in entries {
        wtr.serialize(entry)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_fastest(path: &Path, report: &FastestReport) -> Result<()> {
    let file = FastestFile {
        generated_at: Utc::now(),
        report,
    };
    let json = serde_json::to_string_pretty(&file)?;
    fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

/// Write all four report files into `dir`
pub fn write_reports(
    dir: &Path,
    records: &[MetricRecord],
    rows: &[AggregatedRow],
    algorithms: &AlgorithmSet,
    problems: &ProblemsCollector,
    fastest: &FastestReport,
) -> Result<ReportPaths> {
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let paths = ReportPaths::in_dir(dir);

    write_results(&paths.results, records)?;
    write_aggregated(&paths.aggregated, rows, algorithms)?;
    write_problems(&paths.problems, problems)?;
    write_fastest(&paths.fastest, fastest)?;

    Ok(paths)
}

/// Log problems split into baseline mismatches and everything else,
/// followed by a count per message type
pub fn log_problems(problems: &ProblemsCollector) {
    let (diffs, others) = problems.partition();

    tracing::info!("====== ONLY DIFF ERRORS ======");
    log_grouped(&diffs);
    tracing::info!("====== OTHER ERRORS ======");
    log_grouped(&others);

    for (message, count) in problems.message_histogram() {
        tracing::info!(count, "Problem type: {}", message);
    }
}

fn log_grouped(grouped: &GroupedProblems) {
    for (project, algorithms) in grouped {
        for (algorithm, messages) in algorithms {
            for message in messages {
                tracing::info!(project = %project, algorithm = %algorithm, "{}", message);
            }
        }
    }
}
