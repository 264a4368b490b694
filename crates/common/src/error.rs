//! Error taxonomy shared by the runner and the report pipeline.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type used across MonBench services.
#[derive(Error, Debug)]
pub enum BenchError {
    /// An expected artifact file is absent
    #[error("{artifact} not found: {}", path.display())]
    MissingArtifact {
        artifact: &'static str,
        path: PathBuf,
    },

    /// An artifact exists but could not be read or decoded
    #[error("could not parse {artifact}: {reason}")]
    MalformedArtifact {
        artifact: &'static str,
        reason: String,
    },

    /// No qualifying summary line in a test-runner log
    #[error("no test summary line found")]
    SummaryNotFound,

    /// Memory unit outside the conversion table
    #[error("unknown memory unit: {0}")]
    UnknownUnit(String),

    /// Task process exited with a non-zero code
    #[error("process exited with code {code}")]
    ProcessFailure { code: i32 },

    /// Task process exceeded its wall-clock budget
    #[error("timed out after {0} seconds")]
    Timeout(u64),

    /// Task process could not be constructed or spawned
    #[error("could not launch task: {0}")]
    Launch(String),

    /// Scheduler was asked for zero workers
    #[error("concurrency must be at least 1, got {0}")]
    InvalidConcurrency(usize),

    /// Algorithm label not in the known variant set
    #[error("unknown algorithm: {0}")]
    UnknownAlgorithm(String),

    /// Status label not in the known status set
    #[error("unknown run status: {0}")]
    UnknownStatus(String),

    /// File I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Tabular file error
    #[error("CSV error: {0}")]
    Csv(String),

    /// JSON encode/decode error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// pymon session database error
    #[error("Database error: {0}")]
    Database(String),
}

impl BenchError {
    /// Returns the error code string for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            BenchError::MissingArtifact { .. } => "MISSING_ARTIFACT",
            BenchError::MalformedArtifact { .. } => "MALFORMED_ARTIFACT",
            BenchError::SummaryNotFound => "SUMMARY_NOT_FOUND",
            BenchError::UnknownUnit(_) => "UNKNOWN_UNIT",
            BenchError::ProcessFailure { .. } => "PROCESS_FAILURE",
            BenchError::Timeout(_) => "TIMEOUT",
            BenchError::Launch(_) => "LAUNCH_ERROR",
            BenchError::InvalidConcurrency(_) => "INVALID_CONCURRENCY",
            BenchError::UnknownAlgorithm(_) => "UNKNOWN_ALGORITHM",
            BenchError::UnknownStatus(_) => "UNKNOWN_STATUS",
            BenchError::Io(_) => "IO_ERROR",
            BenchError::Csv(_) => "CSV_ERROR",
            BenchError::Json(_) => "JSON_ERROR",
            BenchError::Database(_) => "DATABASE_ERROR",
        }
    }

    /// Helper for decode failures of a named artifact
    pub fn malformed(artifact: &'static str, reason: impl ToString) -> Self {
        BenchError::MalformedArtifact {
            artifact,
            reason: reason.to_string(),
        }
    }
}

/// Result type alias using BenchError
pub type BenchResult<T> = Result<T, BenchError>;
