//! Common types used across MonBench services.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::BenchError;

/// Monitoring-instrumentation strategy under comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Algorithm {
    /// Uninstrumented baseline
    Original,
    A,
    B,
    C,
    CPlus,
    D,
}

impl Algorithm {
    /// Every known variant, baseline first
    pub const ALL: [Algorithm; 6] = [
        Algorithm::Original,
        Algorithm::A,
        Algorithm::B,
        Algorithm::C,
        Algorithm::CPlus,
        Algorithm::D,
    ];

    /// Label used in artifact file names and report columns
    pub fn label(&self) -> &'static str {
        match self {
            Algorithm::Original => "ORIGINAL",
            Algorithm::A => "A",
            Algorithm::B => "B",
            Algorithm::C => "C",
            Algorithm::CPlus => "C+",
            Algorithm::D => "D",
        }
    }

    /// The trusted baseline performs no monitoring
    pub fn is_baseline(&self) -> bool {
        matches!(self, Algorithm::Original)
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Algorithm {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ORIGINAL" => Ok(Algorithm::Original),
            "A" => Ok(Algorithm::A),
            "B" => Ok(Algorithm::B),
            "C" => Ok(Algorithm::C),
            "C+" => Ok(Algorithm::CPlus),
            "D" => Ok(Algorithm::D),
            _ => Err(BenchError::UnknownAlgorithm(s.to_string())),
        }
    }
}

impl Serialize for Algorithm {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for Algorithm {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Ordered, duplicate-free set of algorithms executed together
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AlgorithmSet(Vec<Algorithm>);

impl AlgorithmSet {
    pub fn new(algorithms: impl IntoIterator<Item = Algorithm>) -> Self {
        let mut seen = Vec::new();
        for algorithm in algorithms {
            if !seen.contains(&algorithm) {
                seen.push(algorithm);
            }
        }
        Self(seen)
    }

    pub fn single(algorithm: Algorithm) -> Self {
        Self(vec![algorithm])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Algorithm> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Space-joined labels, as passed to the container and written to runs.csv
    pub fn label(&self) -> String {
        self.0
            .iter()
            .map(Algorithm::label)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl Default for AlgorithmSet {
    fn default() -> Self {
        Self(Algorithm::ALL.to_vec())
    }
}

impl fmt::Display for AlgorithmSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

impl FromStr for AlgorithmSet {
    type Err = BenchError;

    /// Accepts whitespace- or comma-separated labels
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let algorithms = s
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|part| !part.is_empty())
            .map(str::parse)
            .collect::<Result<Vec<Algorithm>, _>>()?;
        Ok(Self::new(algorithms))
    }
}

/// Execution status of one task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunStatus {
    /// Container started, no terminal status yet
    Running,
    /// Process exited with success code
    Done,
    /// Process exited with non-zero code
    Failed,
    /// Process exceeded the timeout and was killed
    Timeout,
    /// Process could not be constructed or launched
    Exception,
}

impl RunStatus {
    /// Running is the only non-terminal status
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::Running)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "Running",
            RunStatus::Done => "Done",
            RunStatus::Failed => "Failed",
            RunStatus::Timeout => "Timeout",
            RunStatus::Exception => "Exception",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Running" => Ok(RunStatus::Running),
            "Done" => Ok(RunStatus::Done),
            "Failed" => Ok(RunStatus::Failed),
            "Timeout" => Ok(RunStatus::Timeout),
            "Exception" => Ok(RunStatus::Exception),
            other => Err(BenchError::UnknownStatus(other.to_string())),
        }
    }
}

impl Serialize for RunStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for RunStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Identity of a task in the run-status table
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskKey {
    pub link: String,
    /// Revision truncated to 7 characters
    pub sha: String,
    pub algorithms: String,
}

/// One unit of scheduled work: a project revision and the algorithms run together
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub link: String,
    pub sha: String,
    pub algorithms: AlgorithmSet,
}

impl Task {
    pub fn new(link: impl Into<String>, sha: impl Into<String>, algorithms: AlgorithmSet) -> Self {
        Self {
            link: link.into(),
            sha: sha.into(),
            algorithms,
        }
    }

    pub fn key(&self) -> TaskKey {
        TaskKey {
            link: self.link.clone(),
            sha: short_sha(&self.sha).to_string(),
            algorithms: self.algorithms.label(),
        }
    }

    pub fn project_name(&self) -> &str {
        project_name_from_link(&self.link)
    }
}

/// Truncate a revision identifier to its 7-character short form
pub fn short_sha(sha: &str) -> &str {
    match sha.char_indices().nth(7) {
        Some((idx, _)) => &sha[..idx],
        None => sha,
    }
}

/// Last path segment of a repository link, without a `.git` suffix
pub fn project_name_from_link(link: &str) -> &str {
    let last = link
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(link);
    last.strip_suffix(".git").unwrap_or(last)
}
