//! Normalized per-(project, algorithm) metric record

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use monbench_common::Algorithm;

/// ANSI SGR sequences, e.g. `\x1b[31m`
static ANSI_ESCAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1b\[[0-9]+(;[0-9]+)*m").expect("valid ansi regex"));

pub fn strip_ansi(raw: &str) -> String {
    ANSI_ESCAPE.replace_all(raw, "").into_owned()
}

/// A test count as it appeared on the summary line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Count {
    Parsed(u64),
    /// Token that was not a non-negative integer
    Unparsed(String),
}

impl Count {
    pub fn from_token(token: &str) -> Self {
        let clean = strip_ansi(token);
        let clean = clean.trim();
        if !clean.is_empty() && clean.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(value) = clean.parse() {
                return Count::Parsed(value);
            }
        }
        Count::Unparsed(clean.to_string())
    }

    pub fn value(&self) -> Option<u64> {
        match self {
            Count::Parsed(value) => Some(*value),
            Count::Unparsed(_) => None,
        }
    }
}

impl Default for Count {
    fn default() -> Self {
        Count::Parsed(0)
    }
}

impl fmt::Display for Count {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Count::Parsed(value) => write!(f, "{}", value),
            Count::Unparsed(raw) => f.write_str(raw),
        }
    }
}

impl Serialize for Count {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// The counted outcomes of a test run
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CountField {
    Passed,
    Failed,
    Skipped,
    XFailed,
    XPassed,
    Errors,
}

impl CountField {
    pub const ALL: [CountField; 6] = [
        CountField::Passed,
        CountField::Failed,
        CountField::Skipped,
        CountField::XFailed,
        CountField::XPassed,
        CountField::Errors,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            CountField::Passed => "passed",
            CountField::Failed => "failed",
            CountField::Skipped => "skipped",
            CountField::XFailed => "xfailed",
            CountField::XPassed => "xpassed",
            CountField::Errors => "errors",
        }
    }
}

/// Pass/fail counts and elapsed time from the summary line
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TestCounts {
    pub passed: Count,
    pub failed: Count,
    pub skipped: Count,
    pub xfailed: Count,
    pub xpassed: Count,
    pub errors: Count,
}

impl TestCounts {
    pub fn get(&self, field: CountField) -> &Count {
        match field {
            CountField::Passed => &self.passed,
            CountField::Failed => &self.failed,
            CountField::Skipped => &self.skipped,
            CountField::XFailed => &self.xfailed,
            CountField::XPassed => &self.xpassed,
            CountField::Errors => &self.errors,
        }
    }

    pub fn get_mut(&mut self, field: CountField) -> &mut Count {
        match field {
            CountField::Passed => &mut self.passed,
            CountField::Failed => &mut self.failed,
            CountField::Skipped => &mut self.skipped,
            CountField::XFailed => &mut self.xfailed,
            CountField::XPassed => &mut self.xpassed,
            CountField::Errors => &mut self.errors,
        }
    }
}

/// Instrumentation timings from `<ALGO>-time.json`
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Timing {
    pub instrumentation_duration: f64,
    pub monitor_creation_duration: f64,
    pub test_duration: f64,
}

/// Monitor and event counts from `<ALGO>-full.json`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MonitorStats {
    pub total_monitors: u64,
    pub monitors_by_spec: BTreeMap<String, u64>,
    pub total_events: u64,
    /// spec → event → count
    pub events_by_spec: BTreeMap<String, BTreeMap<String, u64>>,
}

/// Violation aggregates from `<ALGO>-violations.json`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViolationStats {
    pub total_violations: u64,
    pub by_spec: BTreeMap<String, u64>,
    /// spec → number of distinct violation kinds
    pub unique_by_spec: BTreeMap<String, usize>,
    /// spec → kind → occurrences
    pub kind_counts: BTreeMap<String, BTreeMap<String, u64>>,
    /// spec → kind → distinct tests
    pub kind_tests: BTreeMap<String, BTreeMap<String, BTreeSet<String>>>,
}

/// One record per (project, algorithm) with at least one located artifact.
///
/// `None` means "not available", which is never the same as zero.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricRecord {
    pub project: String,
    pub algorithm: Algorithm,
    pub counts: Option<TestCounts>,
    pub wall_time: Option<f64>,
    pub execution_problems: String,
    pub memory_bytes: Option<f64>,
    pub instrumentation_duration: Option<f64>,
    pub monitor_creation_duration: Option<f64>,
    pub test_duration: Option<f64>,
    pub violations: Option<ViolationStats>,
    pub monitors: Option<MonitorStats>,
    pub log_archive_link: Option<String>,
}

impl MetricRecord {
    pub fn new(project: impl Into<String>, algorithm: Algorithm) -> Self {
        Self {
            project: project.into(),
            algorithm,
            counts: None,
            wall_time: None,
            execution_problems: String::new(),
            memory_bytes: None,
            instrumentation_duration: None,
            monitor_creation_duration: None,
            test_duration: None,
            violations: None,
            monitors: None,
            log_archive_link: None,
        }
    }

    pub fn count(&self, field: CountField) -> Option<&Count> {
        self.counts.as_ref().map(|counts| counts.get(field))
    }

    pub fn apply_timing(&mut self, timing: Timing) {
        self.instrumentation_duration = Some(timing.instrumentation_duration);
        self.monitor_creation_duration = Some(timing.monitor_creation_duration);
        self.test_duration = Some(timing.test_duration);
    }

    pub fn total_monitors(&self) -> Option<u64> {
        self.monitors.as_ref().map(|m| m.total_monitors)
    }

    pub fn total_events(&self) -> Option<u64> {
        self.monitors.as_ref().map(|m| m.total_events)
    }

    /// Append a paragraph to the free-text problems column
    pub fn note_problem(&mut self, text: impl AsRef<str>) {
        if !self.execution_problems.is_empty() {
            self.execution_problems.push_str("\n\n");
        }
        self.execution_problems.push_str(text.as_ref());
    }

    pub fn to_row(&self) -> ResultRow {
        let count = |field| self.count(field).map(|c| c.to_string());
        let violations = self.violations.as_ref();
        let monitors = self.monitors.as_ref();

        ResultRow {
            project: self.project.clone(),
            algorithm: self.algorithm.label(),
            passed: count(CountField::Passed),
            failed: count(CountField::Failed),
            skipped: count(CountField::Skipped),
            xfailed: count(CountField::XFailed),
            xpassed: count(CountField::XPassed),
            errors: count(CountField::Errors),
            wall_time: self.wall_time,
            execution_problems: self.execution_problems.clone(),
            memory_bytes: self.memory_bytes,
            instrumentation_duration: self.instrumentation_duration,
            monitor_creation_duration: self.monitor_creation_duration,
            test_duration: self.test_duration,
            total_violations: violations.map(|v| v.total_violations),
            violations_by_spec: violations.map(|v| join_pairs(&v.by_spec, ";")),
            unique_violation_counts: violations.map(|v| join_pairs(&v.unique_by_spec, ";")),
            violation_kind_summary: violations.map(|v| cell_json(&v.kind_counts)),
            violation_tests: violations.map(|v| cell_json(&v.kind_tests)),
            total_monitors: monitors.map(|m| m.total_monitors),
            monitor_counts_by_spec: monitors.map(|m| join_pairs(&m.monitors_by_spec, "<>")),
            total_events: monitors.map(|m| m.total_events),
            event_counts_by_spec: monitors.map(|m| {
                m.events_by_spec
                    .iter()
                    .flat_map(|(spec, events)| {
                        events
                            .iter()
                            .map(move |(event, n)| format!("{}={}={}", spec, event, n))
                    })
                    .collect::<Vec<_>>()
                    .join("<>")
            }),
            log_archive_link: self.log_archive_link.clone(),
        }
    }
}

/// `k=v` pairs joined by `sep`
fn join_pairs<V: fmt::Display>(map: &BTreeMap<String, V>, sep: &str) -> String {
    map.iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(sep)
}

/// Nested maps as JSON with commas swapped out so the cell stays single
fn cell_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value)
        .unwrap_or_default()
        .replace(',', "<>")
}

/// Column names of `ResultRow`, in field order
pub const RESULT_COLUMNS: [&str; 24] = [
    "project",
    "algorithm",
    "passed",
    "failed",
    "skipped",
    "xfailed",
    "xpassed",
    "errors",
    "wall_time",
    "execution_problems",
    "memory_bytes",
    "instrumentation_duration",
    "monitor_creation_duration",
    "test_duration",
    "total_violations",
    "violations_by_spec",
    "unique_violation_counts",
    "violation_kind_summary",
    "violation_tests",
    "total_monitors",
    "monitor_counts_by_spec",
    "total_events",
    "event_counts_by_spec",
    "log_archive_link",
];

/// Flat `results.csv` row; empty cells mean "not available"
#[derive(Debug, Clone, Serialize)]
pub struct ResultRow {
    pub project: String,
    pub algorithm: &'static str,
    pub passed: Option<String>,
    pub failed: Option<String>,
    pub skipped: Option<String>,
    pub xfailed: Option<String>,
    pub xpassed: Option<String>,
    pub errors: Option<String>,
    pub wall_time: Option<f64>,
    pub execution_problems: String,
    pub memory_bytes: Option<f64>,
    pub instrumentation_duration: Option<f64>,
    pub monitor_creation_duration: Option<f64>,
    pub test_duration: Option<f64>,
    pub total_violations: Option<u64>,
    pub violations_by_spec: Option<String>,
    pub unique_violation_counts: Option<String>,
    pub violation_kind_summary: Option<String>,
    pub violation_tests: Option<String>,
    pub total_monitors: Option<u64>,
    pub monitor_counts_by_spec: Option<String>,
    pub total_events: Option<u64>,
    pub event_counts_by_spec: Option<String>,
    pub log_archive_link: Option<String>,
}
