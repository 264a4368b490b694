//! Append-only problem collection

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Mutex;

use serde::Serialize;

use monbench_common::{Algorithm, BenchError};

/// Problem categories, used for partitioning and the problems file
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProblemKind {
    MissingArtifact,
    MalformedArtifact,
    SummaryNotFound,
    UnknownUnit,
    Database,
    MissingBaseline,
    /// Count differs from the baseline
    Diff,
    /// Count not comparable because one side is not an integer
    NonNumeric,
    Other,
}

impl ProblemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProblemKind::MissingArtifact => "MISSING_ARTIFACT",
            ProblemKind::MalformedArtifact => "MALFORMED_ARTIFACT",
            ProblemKind::SummaryNotFound => "SUMMARY_NOT_FOUND",
            ProblemKind::UnknownUnit => "UNKNOWN_UNIT",
            ProblemKind::Database => "DATABASE",
            ProblemKind::MissingBaseline => "MISSING_BASELINE",
            ProblemKind::Diff => "DIFF",
            ProblemKind::NonNumeric => "NON_NUMERIC",
            ProblemKind::Other => "OTHER",
        }
    }

    /// Baseline mismatches, as opposed to infrastructure noise
    pub fn is_correctness(&self) -> bool {
        matches!(self, ProblemKind::Diff | ProblemKind::NonNumeric)
    }
}

impl fmt::Display for ProblemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&BenchError> for ProblemKind {
    fn from(err: &BenchError) -> Self {
        match err {
            BenchError::MissingArtifact { .. } => ProblemKind::MissingArtifact,
            BenchError::MalformedArtifact { .. } | BenchError::Json(_) => {
                ProblemKind::MalformedArtifact
            }
            BenchError::SummaryNotFound => ProblemKind::SummaryNotFound,
            BenchError::UnknownUnit(_) => ProblemKind::UnknownUnit,
            BenchError::Database(_) => ProblemKind::Database,
            _ => ProblemKind::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProblemEntry {
    pub project: String,
    pub algorithm: Algorithm,
    pub kind: ProblemKind,
    #[serde(rename = "problem")]
    pub message: String,
}

/// Problems grouped for display: project → algorithm → messages
pub type GroupedProblems = BTreeMap<String, BTreeMap<Algorithm, Vec<String>>>;

/// Shared sink for problems found while extracting and comparing
#[derive(Debug, Default)]
pub struct ProblemsCollector {
    entries: Mutex<Vec<ProblemEntry>>,
}

impl ProblemsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(
        &self,
        project: &str,
        algorithm: Algorithm,
        kind: ProblemKind,
        message: impl Into<String>,
    ) {
        let entry = ProblemEntry {
            project: project.to_string(),
            algorithm,
            kind,
            message: message.into(),
        };
        tracing::warn!(
            project = %entry.project,
            algorithm = %entry.algorithm,
            kind = %entry.kind,
            "{}",
            entry.message
        );
        self.entries
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(entry);
    }

    pub fn entries(&self) -> Vec<ProblemEntry> {
        self.entries
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Split into (correctness diffs, everything else), each grouped
    pub fn partition(&self) -> (GroupedProblems, GroupedProblems) {
        let mut diffs = GroupedProblems::new();
        let mut others = GroupedProblems::new();
        for entry in self.entries() {
            let target = if entry.kind.is_correctness() {
                &mut diffs
            } else {
                &mut others
            };
            target
                .entry(entry.project)
                .or_default()
                .entry(entry.algorithm)
                .or_default()
                .push(entry.message);
        }
        (diffs, others)
    }

    /// Occurrences per message type, where the type is the text before the
    /// first `.` or `:` so per-project details collapse together.
    pub fn message_histogram(&self) -> BTreeMap<String, usize> {
        let mut histogram = BTreeMap::new();
        for entry in self.entries() {
            let head = entry
                .message
                .split(['.', ':'])
                .next()
                .unwrap_or_default()
                .trim()
                .to_string();
            *histogram.entry(head).or_insert(0) += 1;
        }
        histogram
    }
}
