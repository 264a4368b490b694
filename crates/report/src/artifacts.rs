//! Per-(project, algorithm) artifact loading.
//!
//! Every artifact is optional. A missing or unreadable one becomes a problem
//! entry and leaves its fields unset; it never stops the remaining artifacts
//! or other projects from being processed.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::{NoExpand, Regex};
use serde::Deserialize;

use monbench_common::{Algorithm, BenchError, BenchResult};

use crate::problems::{ProblemKind, ProblemsCollector};
use crate::pymon::{self, PymonDb};
use crate::record::{MetricRecord, MonitorStats, Timing, ViolationStats};
use crate::summary;
use crate::units;

pub const LOGS_LINK_FILE: &str = "logs_link.txt";

static LOG_ARCHIVE_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_([A-Za-z+]+)\.zip").expect("valid archive regex"));

/// Artifact names for one algorithm
#[derive(Debug, Clone)]
pub struct ArtifactNames {
    pub run_log: String,
    pub timing: String,
    pub monitors: String,
    pub violations: String,
    pub pymon_db: String,
}

impl ArtifactNames {
    pub fn for_algorithm(algorithm: Algorithm) -> Self {
        let label = algorithm.label();
        Self {
            run_log: format!("{}-pytest-output.txt", label),
            timing: format!("{}-time.json", label),
            monitors: format!("{}-full.json", label),
            violations: format!("{}-violations.json", label),
            pymon_db: pymon::db_file_name(algorithm),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TimingFile {
    #[serde(default)]
    instrumentation_duration: f64,
    #[serde(default)]
    create_monitor_duration: f64,
    #[serde(default)]
    test_duration: f64,
}

#[derive(Debug, Deserialize)]
struct SpecMonitors {
    monitors: u64,
    #[serde(default)]
    events: BTreeMap<String, u64>,
}

#[derive(Debug, Deserialize)]
struct ViolationEntry {
    violation: String,
    test: String,
}

pub fn parse_timing(text: &str) -> BenchResult<Timing> {
    let file: TimingFile =
        serde_json::from_str(text).map_err(|e| BenchError::malformed("json time", e))?;
    Ok(Timing {
        instrumentation_duration: file.instrumentation_duration,
        monitor_creation_duration: file.create_monitor_duration,
        test_duration: file.test_duration,
    })
}

pub fn parse_monitors(text: &str) -> BenchResult<MonitorStats> {
    let specs: BTreeMap<String, SpecMonitors> =
        serde_json::from_str(text).map_err(|e| BenchError::malformed("json full", e))?;

    let mut stats = MonitorStats::default();
    for (spec, entry) in specs {
        stats.total_monitors += entry.monitors;
        stats.total_events += entry.events.values().sum::<u64>();
        stats.monitors_by_spec.insert(spec.clone(), entry.monitors);
        stats.events_by_spec.insert(spec, entry.events);
    }
    Ok(stats)
}

pub fn parse_violations(text: &str) -> BenchResult<ViolationStats> {
    let specs: BTreeMap<String, Vec<ViolationEntry>> =
        serde_json::from_str(text).map_err(|e| BenchError::malformed("json violations", e))?;

    let mut stats = ViolationStats::default();
    for (spec, entries) in specs {
        let mut kinds: BTreeMap<String, u64> = BTreeMap::new();
        let mut tests: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for entry in &entries {
            *kinds.entry(entry.violation.clone()).or_insert(0) += 1;
            tests
                .entry(entry.violation.clone())
                .or_default()
                .insert(entry.test.clone());
        }

        stats.total_violations += entries.len() as u64;
        stats.by_spec.insert(spec.clone(), entries.len() as u64);
        stats.unique_by_spec.insert(spec.clone(), kinds.len());
        stats.kind_counts.insert(spec.clone(), kinds);
        stats.kind_tests.insert(spec, tests);
    }
    Ok(stats)
}

/// Substitute the algorithm into the archive name, e.g. `run_ORIGINAL.zip`
pub fn rewrite_log_link(template: &str, algorithm: Algorithm) -> String {
    let replacement = format!("_{}.zip", algorithm.label());
    LOG_ARCHIVE_TOKEN
        .replace_all(template.trim(), NoExpand(&replacement))
        .into_owned()
}

/// Problems held back until we know the record exists at all
#[derive(Default)]
struct Pending(Vec<(ProblemKind, String)>);

impl Pending {
    fn error(&mut self, err: &BenchError) {
        self.0.push((ProblemKind::from(err), err.to_string()));
    }

    fn missing(&mut self, artifact: &'static str) {
        self.0
            .push((ProblemKind::MissingArtifact, format!("{} not found", artifact)));
    }
}

pub struct ArtifactExtractor<'a> {
    problems: &'a ProblemsCollector,
    scan_lines: usize,
    max_db_rows: usize,
}

impl<'a> ArtifactExtractor<'a> {
    pub fn new(problems: &'a ProblemsCollector, scan_lines: usize, max_db_rows: usize) -> Self {
        Self {
            problems,
            scan_lines,
            max_db_rows,
        }
    }

    /// Artifacts live at the top of the project directory (batched runs) or
    /// in a per-algorithm subdirectory (split runs).
    fn resolve(dir: &Path, algorithm: Algorithm, file: &str) -> Option<PathBuf> {
        [dir.join(file), dir.join(algorithm.label()).join(file)]
            .into_iter()
            .find(|p| p.is_file())
    }

    fn read(path: &Path, artifact: &'static str) -> BenchResult<String> {
        fs::read_to_string(path).map_err(|e| BenchError::malformed(artifact, e))
    }

    /// Build the record for one algorithm, or `None` if no artifact exists
    pub fn extract(&self, dir: &Path, project: &str, algorithm: Algorithm) -> Option<MetricRecord> {
        let names = ArtifactNames::for_algorithm(algorithm);
        let mut record = MetricRecord::new(project, algorithm);
        let mut pending = Pending::default();
        let mut located = false;

        // ── Run log: summary, structural failures, memory ────
        match Self::resolve(dir, algorithm, &names.run_log) {
            Some(path) => {
                located = true;
                match Self::read(&path, "pytest output") {
                    Ok(text) => self.apply_run_log(&text, &mut record, &mut pending),
                    Err(e) => {
                        record.note_problem(e.to_string());
                        pending.error(&e);
                    }
                }
            }
            None => pending.missing("pytest output"),
        }

        // ── Timing JSON ──────────────────────────────────────
        match Self::resolve(dir, algorithm, &names.timing) {
            Some(path) => {
                located = true;
                match Self::read(&path, "json time").and_then(|text| parse_timing(&text)) {
                    Ok(timing) => record.apply_timing(timing),
                    Err(e) => pending.error(&e),
                }
            }
            None => pending.missing("json time"),
        }

        // ── Instrumented variants only ───────────────────────
        if !algorithm.is_baseline() {
            match Self::resolve(dir, algorithm, &names.violations) {
                Some(path) => {
                    located = true;
                    match Self::read(&path, "json violations")
                        .and_then(|text| parse_violations(&text))
                    {
                        Ok(stats) => record.violations = Some(stats),
                        Err(e) => pending.error(&e),
                    }
                }
                None => pending.missing("json violations"),
            }

            match Self::resolve(dir, algorithm, &names.monitors) {
                Some(path) => {
                    located = true;
                    match Self::read(&path, "json full").and_then(|text| parse_monitors(&text)) {
                        Ok(stats) => record.monitors = Some(stats),
                        Err(e) => pending.error(&e),
                    }
                }
                None => pending.missing("json full"),
            }
        }

        // ── pymon fallback for whatever is still unset ───────
        if record.test_duration.is_none() || record.memory_bytes.is_none() {
            if let Some(path) = Self::resolve(dir, algorithm, &names.pymon_db) {
                located |= self.apply_pymon(&path, &mut record, &mut pending);
            }
        }

        if !located {
            self.problems.add(
                project,
                algorithm,
                ProblemKind::MissingArtifact,
                "No artifacts found",
            );
            return None;
        }

        if let Some(path) = Self::resolve(dir, algorithm, LOGS_LINK_FILE) {
            match Self::read(&path, "logs link") {
                Ok(template) => {
                    record.log_archive_link = Some(rewrite_log_link(&template, algorithm))
                }
                Err(e) => pending.error(&e),
            }
        }

        for (kind, message) in pending.0 {
            self.problems.add(project, algorithm, kind, message);
        }
        Some(record)
    }

    fn apply_run_log(&self, text: &str, record: &mut MetricRecord, pending: &mut Pending) {
        match summary::parse_output(text, self.scan_lines) {
            Ok(summary) => {
                record.counts = Some(summary.counts);
                record.wall_time = Some(summary.time);
            }
            Err(e) => {
                record.note_problem(e.to_string());
                pending.error(&e);
            }
        }

        if let Some(regions) = summary::structural_failures(text) {
            record.note_problem(regions);
        }

        match units::sum_memory_lines(text) {
            Ok(total) if total.lines > 0 => record.memory_bytes = Some(total.bytes),
            Ok(_) => {}
            Err(e) => {
                record.note_problem(format!("Could not process memory lines: {}", e));
                pending.error(&e);
            }
        }
    }

    /// Returns whether the database supplied any value
    fn apply_pymon(&self, path: &Path, record: &mut MetricRecord, pending: &mut Pending) -> bool {
        let db = match PymonDb::open(path, record.algorithm, self.max_db_rows) {
            Ok(db) => db,
            Err(e) => {
                pending.error(&e);
                return false;
            }
        };

        let mut supplied = false;
        if record.test_duration.is_none() {
            match db.user_time() {
                Ok(seconds) => {
                    record.test_duration = Some(seconds);
                    supplied = true;
                }
                Err(e) => pending.error(&e),
            }
        }
        if record.memory_bytes.is_none() {
            match db.memory_mb().and_then(|mb| units::to_bytes(mb, "MB")) {
                Ok(bytes) => {
                    record.memory_bytes = Some(bytes);
                    supplied = true;
                }
                Err(e) => pending.error(&e),
            }
        }
        supplied
    }
}
