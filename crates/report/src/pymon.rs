//! Fallback metrics from the pytest-monitor session database (`db.pymon_<ALGO>`)

use std::path::Path;

use rusqlite::{Connection, OpenFlags};

use monbench_common::{Algorithm, BenchError, BenchResult};

/// Average memory per session, in megabytes
const SQL_QUERY_MEM: &str = "SELECT t.RUN_DESCRIPTION, AVG(m.MEM_USAGE) AS average_memory_usage \
     FROM TEST_METRICS m JOIN TEST_SESSIONS t ON m.SESSION_H = t.SESSION_H \
     GROUP BY t.SESSION_H";

/// Total user CPU time per session, in seconds
const SQL_QUERY_TIME: &str = "SELECT t.RUN_DESCRIPTION, SUM(m.USER_TIME) AS total_user_time \
     FROM TEST_METRICS m JOIN TEST_SESSIONS t ON m.SESSION_H = t.SESSION_H \
     GROUP BY t.SESSION_H";

pub fn db_file_name(algorithm: Algorithm) -> String {
    format!("db.pymon_{}", algorithm.label())
}

/// Read-only handle on one session database
pub struct PymonDb {
    conn: Connection,
    algorithm: Algorithm,
    max_rows: usize,
}

impl PymonDb {
    pub fn open(path: &Path, algorithm: Algorithm, max_rows: usize) -> BenchResult<Self> {
        if !path.is_file() {
            return Err(BenchError::MissingArtifact {
                artifact: "pymon database",
                path: path.to_path_buf(),
            });
        }
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .map_err(|e| BenchError::Database(e.to_string()))?;
        Ok(Self {
            conn,
            algorithm,
            max_rows,
        })
    }

    /// Average memory of this algorithm's session, in megabytes
    pub fn memory_mb(&self) -> BenchResult<f64> {
        self.session_value(SQL_QUERY_MEM)
    }

    /// Summed user time of this algorithm's session, in seconds
    pub fn user_time(&self) -> BenchResult<f64> {
        self.session_value(SQL_QUERY_TIME)
    }

    fn session_value(&self, sql: &str) -> BenchResult<f64> {
        let mut stmt = self
            .conn
            .prepare(sql)
            .map_err(|e| BenchError::Database(e.to_string()))?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, Option<String>>(0)?,
                    row.get::<_, Option<f64>>(1)?,
                ))
            })
            .map_err(|e| BenchError::Database(e.to_string()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| BenchError::Database(e.to_string()))?;

        if rows.is_empty() {
            return Err(BenchError::Database("No data in database".to_string()));
        }
        if rows.len() > self.max_rows {
            return Err(BenchError::Database(format!(
                "Too many lines in database. len={}",
                rows.len()
            )));
        }

        let tag = format!("\"ALGO_{}\"", self.algorithm.label());
        rows.into_iter()
            .find(|(description, _)| description.as_deref().is_some_and(|d| d.contains(&tag)))
            .and_then(|(_, value)| value)
            .map(round2)
            .ok_or_else(|| BenchError::Database(format!("no session tagged {}", tag)))
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_db(path: &Path, sessions: &[(&str, &str, &[(f64, f64)])]) {
        let conn = Connection::open(path).unwrap();
        conn.execute_batch(
            "CREATE TABLE TEST_SESSIONS (SESSION_H TEXT PRIMARY KEY, RUN_DESCRIPTION TEXT);
             CREATE TABLE TEST_METRICS (SESSION_H TEXT, MEM_USAGE REAL, USER_TIME REAL);",
        )
        .unwrap();
        for (session, description, metrics) in sessions {
            conn.execute(
                "INSERT INTO TEST_SESSIONS VALUES (?1, ?2)",
                rusqlite::params![session, description],
            )
            .unwrap();
            for (mem, time) in metrics.iter() {
                conn.execute(
                    "INSERT INTO TEST_METRICS VALUES (?1, ?2, ?3)",
                    rusqlite::params![session, mem, time],
                )
                .unwrap();
            }
        }
    }

    #[test]
    fn test_selects_tagged_session() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(db_file_name(Algorithm::CPlus));
        create_db(
            &path,
            &[
                ("s1", r#"{"algo": "ALGO_C"}"#, &[(10.0, 1.0)]),
                ("s2", r#"{"algo": "ALGO_C+"}"#, &[(20.0, 1.5), (30.0, 2.25)]),
            ],
        );

        let db = PymonDb::open(&path, Algorithm::CPlus, 6).unwrap();
        assert_eq!(db.memory_mb().unwrap(), 25.0);
        assert_eq!(db.user_time().unwrap(), 3.75);
    }

    #[test]
    fn test_too_many_sessions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.pymon_B");
        create_db(
            &path,
            &[
                ("s1", "\"ALGO_B\"", &[(1.0, 1.0)]),
                ("s2", "\"ALGO_C\"", &[(1.0, 1.0)]),
                ("s3", "\"ALGO_D\"", &[(1.0, 1.0)]),
            ],
        );

        let db = PymonDb::open(&path, Algorithm::B, 2).unwrap();
        let err = db.memory_mb().unwrap_err();
        assert!(err.to_string().contains("Too many lines"));
    }

    #[test]
    fn test_missing_db() {
        let dir = tempfile::tempdir().unwrap();
        let err = PymonDb::open(&dir.path().join("db.pymon_A"), Algorithm::A, 6)
            .err()
            .unwrap();
        assert_eq!(err.error_code(), "MISSING_ARTIFACT");
    }

    #[test]
    fn test_untagged_sessions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.pymon_D");
        create_db(&path, &[("s1", "ALGO_D without quotes", &[(1.0, 1.0)])]);

        let db = PymonDb::open(&path, Algorithm::D, 6).unwrap();
        assert_eq!(db.user_time().unwrap_err().error_code(), "DATABASE_ERROR");
    }
}
