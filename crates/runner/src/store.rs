//! Durable run-status table shared by all workers
//!
//! The in-memory table is authoritative. Every upsert mutates it and rewrites
//! the CSV snapshot inside one critical section, so concurrent workers can
//! neither lose nor interleave updates. The snapshot is written to a sibling
//! temp file and renamed into place.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use monbench_common::{BenchError, BenchResult, RunStatus, TaskKey};

/// Elapsed time recorded while a task is still running
pub const ELAPSED_UNSET: f64 = -1.0;

/// One row of `runs.csv`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunStatusRecord {
    pub link: String,
    pub sha: String,
    pub algorithms: String,
    pub status: RunStatus,
    pub elapsed_time: f64,
}

#[derive(Default)]
struct Table {
    rows: Vec<RunStatusRecord>,
    index: HashMap<TaskKey, usize>,
}

/// Key → status table backed by a single CSV file
pub struct RunStatusStore {
    path: PathBuf,
    table: Mutex<Table>,
}

impl RunStatusStore {
    /// Start a fresh run: any previous table file is removed
    pub fn reset(path: impl Into<PathBuf>) -> BenchResult<Self> {
        let path = path.into();
        match fs::remove_file(&path) {
            Ok(()) => tracing::info!(path = %path.display(), "Removed previous run-status table"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        Ok(Self {
            path,
            table: Mutex::new(Table::default()),
        })
    }

    /// Read path: a cold store (file absent) is an empty table
    pub fn load(path: &Path) -> BenchResult<Vec<RunStatusRecord>> {
        if !path.exists() {
            return Ok(Vec::new());
        }
        let mut reader =
            csv::Reader::from_path(path).map_err(|e| BenchError::Csv(e.to_string()))?;
        reader
            .deserialize()
            .map(|row| row.map_err(|e| BenchError::Csv(e.to_string())))
            .collect()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Insert or update the row for `key` and persist the whole table.
    ///
    /// Blocks on file IO; async callers go through `upsert_blocking`.
    pub fn upsert(&self, key: &TaskKey, status: RunStatus, elapsed_time: f64) -> BenchResult<()> {
        let mut table = self.lock();

        let record = RunStatusRecord {
            link: key.link.clone(),
            sha: key.sha.clone(),
            algorithms: key.algorithms.clone(),
            status,
            elapsed_time,
        };
        match table.index.get(key) {
            Some(&pos) => table.rows[pos] = record,
            None => {
                let pos = table.rows.len();
                table.index.insert(key.clone(), pos);
                table.rows.push(record);
            }
        }

        self.persist(&table.rows)
    }

    /// `upsert` on tokio's blocking pool
    pub async fn upsert_blocking(
        self: Arc<Self>,
        key: TaskKey,
        status: RunStatus,
        elapsed_time: f64,
    ) -> BenchResult<()> {
        tokio::task::spawn_blocking(move || self.upsert(&key, status, elapsed_time))
            .await
            .map_err(|e| BenchError::Io(std::io::Error::other(e)))?
    }

    #[cfg(test)]
    pub fn get(&self, key: &TaskKey) -> Option<RunStatusRecord> {
        let table = self.lock();
        table.index.get(key).map(|&pos| table.rows[pos].clone())
    }

    /// Snapshot of all rows in insertion order
    #[cfg(test)]
    pub fn rows(&self) -> Vec<RunStatusRecord> {
        self.lock().rows.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Table> {
        // A panic mid-upsert leaves the previous snapshot on disk and a whole row in memory
        self.table.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn persist(&self, rows: &[RunStatusRecord]) -> BenchResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let tmp = self.path.with_extension("csv.tmp");
        {
            let mut writer =
                csv::Writer::from_path(&tmp).map_err(|e| BenchError::Csv(e.to_string()))?;
            if rows.is_empty() {
                writer
                    .write_record(["link", "sha", "algorithms", "status", "elapsed_time"])
                    .map_err(|e| BenchError::Csv(e.to_string()))?;
            }
            for row in rows {
                writer
                    .serialize(row)
                    .map_err(|e| BenchError::Csv(e.to_string()))?;
            }
            writer.flush()?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
