//! Walks the results directory and builds the per-project records

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use walkdir::WalkDir;

use crate::artifacts::ArtifactExtractor;
use crate::baseline;
use crate::config::ReportConfig;
use crate::problems::ProblemsCollector;
use crate::record::MetricRecord;

/// A project's artifact directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectDir {
    pub name: String,
    pub path: PathBuf,
}

/// Immediate subdirectories of `results_dir`, sorted by name.
/// Directories with `report` in their name hold previous outputs.
pub fn discover_projects(results_dir: &Path) -> Result<Vec<ProjectDir>> {
    if !results_dir.is_dir() {
        bail!("results directory {} does not exist", results_dir.display());
    }

    let mut projects = Vec::new();
    for entry in WalkDir::new(results_dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!("Error reading directory entry: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.contains("report") {
            tracing::debug!(dir = %name, "Skipping report directory");
            continue;
        }
        projects.push(ProjectDir {
            name,
            path: entry.into_path(),
        });
    }
    Ok(projects)
}

/// Everything gathered from the results directory
#[derive(Debug)]
pub struct Collected {
    pub records: Vec<MetricRecord>,
    pub problems: ProblemsCollector,
}

/// Extract every configured algorithm of every project, then compare each
/// project against its baseline
pub fn collect(config: &ReportConfig) -> Result<Collected> {
    let projects = discover_projects(&config.results_dir)?;
    tracing::info!(
        projects = projects.len(),
        results_dir = %config.results_dir.display(),
        "Collecting results"
    );

    let problems = ProblemsCollector::new();
    let extractor = ArtifactExtractor::new(&problems, config.scan_lines, config.max_db_rows);
    let mut records = Vec::new();

    for project in &projects {
        let project_records: Vec<MetricRecord> = config
            .algorithms
            .iter()
            .filter_map(|algorithm| extractor.extract(&project.path, &project.name, *algorithm))
            .collect();

        if project_records.is_empty() {
            tracing::warn!(project = %project.name, "No results found");
            continue;
        }

        let mismatches = baseline::compare_project(&project.name, &project_records, &problems);
        tracing::info!(
            project = %project.name,
            algorithms = project_records.len(),
            mismatches,
            "Project processed"
        );
        records.extend(project_records);
    }

    Ok(Collected { records, problems })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    use monbench_common::Algorithm;

    use crate::problems::ProblemKind;

    const LOG_TWO_FAILED: &str = "== 2 failed, 5 passed in 12.00s ==\n";
    const LOG_THREE_FAILED: &str = "== 3 failed, 4 passed in 13.00s ==\n";

    fn write(dir: &Path, name: &str, content: &str) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn test_discover_skips_reports_and_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("beta_1111111")).unwrap();
        fs::create_dir_all(dir.path().join("alpha_0000000")).unwrap();
        fs::create_dir_all(dir.path().join("report_2024")).unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();

        let names: Vec<String> = discover_projects(dir.path())
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["alpha_0000000", "beta_1111111"]);
    }

    #[test]
    fn test_missing_results_dir() {
        assert!(discover_projects(Path::new("/no/such/results")).is_err());
    }

    #[test]
    fn test_collect_compares_against_baseline() {
        let dir = tempfile::tempdir().unwrap();
        let project = dir.path().join("alpha_0000000");
        write(&project, "ORIGINAL-pytest-output.txt", LOG_TWO_FAILED);
        write(&project, "ORIGINAL-time.json", r#"{"test_duration": 12.0}"#);
        write(&project, "B-pytest-output.txt", LOG_THREE_FAILED);
        write(&project, "B-time.json", r#"{"test_duration": 13.0}"#);
        write(&project, "B-full.json", "{}");
        write(&project, "B-violations.json", "{}");
        fs::create_dir_all(dir.path().join("empty_2222222")).unwrap();

        let config = ReportConfig {
            results_dir: dir.path().to_path_buf(),
            algorithms: "ORIGINAL B".parse().unwrap(),
            ..ReportConfig::default()
        };
        let collected = collect(&config).unwrap();

        assert_eq!(collected.records.len(), 2);
        assert_eq!(collected.records[1].algorithm, Algorithm::B);

        let entries = collected.problems.entries();
        let diffs: Vec<_> = entries.iter().filter(|e| e.kind == ProblemKind::Diff).collect();
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].message, "DIFF: failed is different from ORIGINAL. diff=-1");
        // the empty project yields one "no artifacts" entry per algorithm
        assert_eq!(
            entries.iter().filter(|e| e.project == "empty_2222222").count(),
            2
        );
    }
}
