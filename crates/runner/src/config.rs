//! Configuration for the MonBench runner
//!
//! All settings come from environment variables (a `.env` file is honoured)
//! and are validated once at startup.

use std::env;
use std::path::PathBuf;

use monbench_common::AlgorithmSet;

const DEFAULT_PROJECTS_CSV: &str = "project-links.csv";
const DEFAULT_RESULTS_DIR: &str = "results";
const DEFAULT_RUNS_CSV: &str = "runs.csv";
const DEFAULT_MAX_CONCURRENT: usize = 3;
const DEFAULT_TIMEOUT_SECS: u64 = 14400;
const DEFAULT_TIMEOUT_GRACE_SECS: u64 = 300;
const DEFAULT_DOCKER_IMAGE: &str = "pymop-experiment";
const DEFAULT_RESULTS_MOUNT: &str = "/experiment/__results__";

/// Runner configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Project list with `link` and `sha` columns
    pub projects_csv: PathBuf,

    /// Root of the per-task artifact directories
    pub results_dir: PathBuf,

    /// Run-status table
    pub runs_csv: PathBuf,

    /// Maximum number of containers running at once
    pub max_concurrent: usize,

    /// Timeout handed to the container for its own test run
    pub timeout_secs: u64,

    /// Extra time the orchestrator waits before killing the container
    pub timeout_grace_secs: u64,

    /// Algorithms to benchmark
    pub algorithms: AlgorithmSet,

    /// Run all algorithms of a project in a single container
    pub batch_algorithms: bool,

    pub docker: DockerConfig,
}

/// Container invocation settings
#[derive(Debug, Clone)]
pub struct DockerConfig {
    /// Container CLI binary
    pub bin: String,

    /// Experiment image built ahead of time
    pub image: String,

    /// Where the artifact directory is mounted inside the container
    pub results_mount: String,

    /// Names of environment variables forwarded with `-e NAME`
    pub forward_env: Vec<String>,
}

impl RunnerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build configuration from any variable source
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let max_concurrent: usize =
            parse_var(&var, "MAX_CONCURRENT_CONTAINERS", DEFAULT_MAX_CONCURRENT)?;
        if max_concurrent == 0 {
            return Err(ConfigError::InvalidValue(
                "MAX_CONCURRENT_CONTAINERS".to_string(),
            ));
        }

        let algorithms = match var("ALGORITHMS") {
            Some(raw) => raw
                .parse::<AlgorithmSet>()
                .ok()
                .filter(|set| !set.is_empty())
                .ok_or_else(|| ConfigError::InvalidValue("ALGORITHMS".to_string()))?,
            None => AlgorithmSet::default(),
        };

        Ok(Self {
            projects_csv: path_var(&var, "PROJECTS_CSV", DEFAULT_PROJECTS_CSV),
            results_dir: path_var(&var, "RESULTS_DIR", DEFAULT_RESULTS_DIR),
            runs_csv: path_var(&var, "RUNS_CSV", DEFAULT_RUNS_CSV),
            max_concurrent,
            timeout_secs: parse_var(&var, "TASK_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?,
            timeout_grace_secs: parse_var(
                &var,
                "TASK_TIMEOUT_GRACE_SECS",
                DEFAULT_TIMEOUT_GRACE_SECS,
            )?,
            algorithms,
            batch_algorithms: var("BATCH_ALGORITHMS")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(true),
            docker: DockerConfig::from_lookup(&var),
        })
    }
}

impl DockerConfig {
    fn from_lookup(var: &impl Fn(&str) -> Option<String>) -> Self {
        Self {
            bin: var("DOCKER_BIN").unwrap_or_else(|| "docker".to_string()),
            image: var("DOCKER_IMAGE").unwrap_or_else(|| DEFAULT_DOCKER_IMAGE.to_string()),
            results_mount: var("CONTAINER_RESULTS_MOUNT")
                .unwrap_or_else(|| DEFAULT_RESULTS_MOUNT.to_string()),
            forward_env: var("FORWARD_ENV")
                .unwrap_or_else(|| "GITHUB_TOKEN".to_string())
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(String::from)
                .collect(),
        }
    }
}

fn path_var(var: &impl Fn(&str) -> Option<String>, name: &str, default: &str) -> PathBuf {
    PathBuf::from(var(name).unwrap_or_else(|| default.to_string()))
}

fn parse_var<T: std::str::FromStr>(
    var: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> Result<T, ConfigError> {
    match var(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(name.to_string())),
        None => Ok(default),
    }
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}
