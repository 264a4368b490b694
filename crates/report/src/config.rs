//! Configuration for the MonBench report pipeline

use std::env;
use std::path::PathBuf;

use monbench_common::AlgorithmSet;

use crate::stats::DEFAULT_FLOOR_SECS;
use crate::summary::DEFAULT_SCAN_LINES;

const DEFAULT_RESULTS_DIR: &str = "results";
const DEFAULT_REPORT_DIR: &str = ".";
/// One pymon session per algorithm
const DEFAULT_MAX_DB_ROWS: usize = 6;

/// Report configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct ReportConfig {
    /// Directory holding one subdirectory per project
    pub results_dir: PathBuf,

    /// Where the report files are written
    pub report_dir: PathBuf,

    /// Algorithms looked for in every project, in column order
    pub algorithms: AlgorithmSet,

    /// Minimum duration for the fastest-algorithm analysis
    pub floor_secs: f64,

    /// Trailing lines searched for the test summary
    pub scan_lines: usize,

    /// Maximum sessions accepted in a pymon database
    pub max_db_rows: usize,
}

impl ReportConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let algorithms = match env::var("ALGORITHMS") {
            Ok(raw) => raw
                .parse::<AlgorithmSet>()
                .ok()
                .filter(|set| !set.is_empty())
                .ok_or_else(|| ConfigError::InvalidValue("ALGORITHMS".to_string()))?,
            Err(_) => AlgorithmSet::default(),
        };

        let floor_secs: f64 = parse_var("FASTEST_FLOOR_SECS", DEFAULT_FLOOR_SECS)?;
        if !floor_secs.is_finite() || floor_secs < 0.0 {
            return Err(ConfigError::InvalidValue("FASTEST_FLOOR_SECS".to_string()));
        }

        Ok(Self {
            results_dir: path_var("RESULTS_DIR", DEFAULT_RESULTS_DIR),
            report_dir: path_var("REPORT_DIR", DEFAULT_REPORT_DIR),
            algorithms,
            floor_secs,
            scan_lines: parse_var("TAIL_SCAN_LINES", DEFAULT_SCAN_LINES)?,
            max_db_rows: parse_var("MAX_DB_ROWS", DEFAULT_MAX_DB_ROWS)?,
        })
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            results_dir: PathBuf::from(DEFAULT_RESULTS_DIR),
            report_dir: PathBuf::from(DEFAULT_REPORT_DIR),
            algorithms: AlgorithmSet::default(),
            floor_secs: DEFAULT_FLOOR_SECS,
            scan_lines: DEFAULT_SCAN_LINES,
            max_db_rows: DEFAULT_MAX_DB_ROWS,
        }
    }
}

fn path_var(name: &str, default: &str) -> PathBuf {
    PathBuf::from(env::var(name).unwrap_or_else(|_| default.to_string()))
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(name.to_string())),
        Err(_) => Ok(default),
    }
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}
