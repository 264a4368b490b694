//! Pivot of the per-(project, algorithm) records into one row per project

use std::collections::BTreeMap;

use monbench_common::{Algorithm, AlgorithmSet};

use crate::record::MetricRecord;

/// Variants `best_other` is taken over
pub const COMPARISON_ALGORITHMS: [Algorithm; 3] = [Algorithm::B, Algorithm::C, Algorithm::CPlus];

/// The variant measured against `best_other`
pub const FINAL_ALGORITHM: Algorithm = Algorithm::D;

/// Per-algorithm columns of one project
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AlgorithmColumns {
    pub test_duration: Option<f64>,
    pub total_monitors: Option<u64>,
    pub total_events: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedRow {
    pub project: String,
    /// Only algorithms that produced a record appear here
    pub columns: BTreeMap<Algorithm, AlgorithmColumns>,
    pub best_other: Option<f64>,
    pub diff: Option<f64>,
}

impl AggregatedRow {
    fn new(project: String) -> Self {
        Self {
            project,
            columns: BTreeMap::new(),
            best_other: None,
            diff: None,
        }
    }

    pub fn duration(&self, algorithm: Algorithm) -> Option<f64> {
        self.columns.get(&algorithm).and_then(|c| c.test_duration)
    }

    fn derive(&mut self) {
        self.best_other = COMPARISON_ALGORITHMS
            .iter()
            .filter_map(|a| self.duration(*a))
            .reduce(f64::min);
        self.diff = match (self.duration(FINAL_ALGORITHM), self.best_other) {
            (Some(last), Some(best)) => Some(round5(last - best)),
            _ => None,
        };
    }

    /// Cells in `header` order; missing values are empty
    pub fn to_record(&self, algorithms: &AlgorithmSet) -> Vec<String> {
        let mut cells = vec![self.project.clone()];
        cells.extend(algorithms.iter().map(|a| cell(self.duration(*a))));
        cells.push(cell(self.best_other));
        cells.push(cell(self.diff));
        for algorithm in algorithms.iter().filter(|a| !a.is_baseline()) {
            let columns = self.columns.get(algorithm).copied().unwrap_or_default();
            cells.push(cell(columns.total_monitors));
            cells.push(cell(columns.total_events));
        }
        cells
    }
}

/// Column names for the aggregated file.
///
/// The baseline gets no monitor/event columns since it runs uninstrumented.
pub fn header(algorithms: &AlgorithmSet) -> Vec<String> {
    let mut columns = vec!["project".to_string()];
    columns.extend(algorithms.iter().map(|a| format!("test_duration_{}", a)));
    columns.push("best_other".to_string());
    columns.push("diff".to_string());
    for algorithm in algorithms.iter().filter(|a| !a.is_baseline()) {
        columns.push(format!("total_monitors_{}", algorithm));
        columns.push(format!("total_events_{}", algorithm));
    }
    columns
}

/// Outer join on project: every project with any record gets a row
pub fn aggregate(records: &[MetricRecord]) -> Vec<AggregatedRow> {
    let mut rows: BTreeMap<String, AggregatedRow> = BTreeMap::new();
    for record in records {
        let row = rows
            .entry(record.project.clone())
            .or_insert_with(|| AggregatedRow::new(record.project.clone()));
        row.columns.insert(
            record.algorithm,
            AlgorithmColumns {
                test_duration: record.test_duration,
                total_monitors: record.total_monitors(),
                total_events: record.total_events(),
            },
        );
    }

    rows.into_values()
        .map(|mut row| {
            row.derive();
            row
        })
        .collect()
}

fn round5(value: f64) -> f64 {
    (value * 100_000.0).round() / 100_000.0
}

fn cell<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(project: &str, algorithm: Algorithm, duration: Option<f64>) -> MetricRecord {
        let mut record = MetricRecord::new(project, algorithm);
        record.test_duration = duration;
        record
    }

    #[test]
    fn test_best_other_and_diff() {
        let records = [
            record("alpha", Algorithm::B, Some(10.0)),
            record("alpha", Algorithm::C, Some(8.0)),
            record("alpha", Algorithm::CPlus, Some(9.0)),
            record("alpha", Algorithm::D, Some(7.0)),
        ];

        let rows = aggregate(&records);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].best_other, Some(8.0));
        assert_eq!(rows[0].diff, Some(-1.0));
    }

    #[test]
    fn test_outer_join_keeps_partial_projects() {
        let records = [
            record("alpha", Algorithm::Original, Some(3.0)),
            record("beta", Algorithm::D, Some(2.0)),
            record("beta", Algorithm::C, None),
        ];

        let rows = aggregate(&records);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].project, "alpha");
        assert_eq!(rows[0].duration(Algorithm::D), None);
        assert_eq!(rows[0].best_other, None);
        assert_eq!(rows[1].best_other, None);
        assert_eq!(rows[1].diff, None);
    }

    #[test]
    fn test_diff_is_rounded() {
        let records = [
            record("alpha", Algorithm::B, Some(0.1)),
            record("alpha", Algorithm::D, Some(0.3)),
        ];
        assert_eq!(aggregate(&records)[0].diff, Some(0.2));
    }

    #[test]
    fn test_header_drops_baseline_monitor_columns() {
        let algorithms = AlgorithmSet::default();
        let columns = header(&algorithms);

        assert_eq!(columns[0], "project");
        assert!(columns.contains(&"test_duration_ORIGINAL".to_string()));
        assert!(columns.contains(&"total_events_C+".to_string()));
        assert!(!columns.contains(&"total_monitors_ORIGINAL".to_string()));
        assert!(!columns.contains(&"total_events_ORIGINAL".to_string()));

        let rows = aggregate(&[record("alpha", Algorithm::B, Some(1.5))]);
        let cells = rows[0].to_record(&algorithms);
        assert_eq!(cells.len(), columns.len());
        assert_eq!(cells[2], "");
        assert_eq!(cells[3], "1.5");
    }
}
