//! Which instrumented variant is fastest per project

use std::collections::BTreeMap;

use serde::Serialize;

use monbench_common::Algorithm;

use crate::aggregate::{AggregatedRow, COMPARISON_ALGORITHMS, FINAL_ALGORITHM};

/// Default minimum duration, in seconds, for a project to count
pub const DEFAULT_FLOOR_SECS: f64 = 5.0;

/// Variants competing for "fastest"
pub const CANDIDATES: [Algorithm; 4] = [Algorithm::B, Algorithm::C, Algorithm::CPlus, Algorithm::D];

/// Durations that must all be above the floor for a project to be eligible
const ELIGIBILITY: [Algorithm; 5] = [
    Algorithm::Original,
    Algorithm::B,
    Algorithm::C,
    Algorithm::CPlus,
    Algorithm::D,
];

const DRAW: &str = "draw";
const NO_WINNER: &str = "None";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TallyEntry {
    pub label: String,
    pub count: usize,
    /// Share of eligible projects, in percent
    pub percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outperformer {
    pub project: String,
    pub algorithm: Algorithm,
    /// test_duration_D / min(B, C, C+)
    pub ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FastestReport {
    pub total_projects: usize,
    pub eligible_projects: usize,
    pub floor_secs: f64,
    /// Strict minimum; ties count as `draw`
    pub fastest: Vec<TallyEntry>,
    /// Below mean minus one standard deviation; otherwise `None`
    pub significant: Vec<TallyEntry>,
    /// Projects where B, C or C+ wins significantly, by ratio descending
    pub outperformers: Vec<Outperformer>,
}

/// Candidate durations if every eligibility column is above the floor
fn eligible_durations(row: &AggregatedRow, floor: f64) -> Option<[f64; 4]> {
    let above = ELIGIBILITY
        .iter()
        .all(|a| row.duration(*a).is_some_and(|d| d > floor));
    if !above {
        return None;
    }
    let mut durations = [0.0; 4];
    for (slot, algorithm) in durations.iter_mut().zip(CANDIDATES) {
        *slot = row.duration(algorithm)?;
    }
    Some(durations)
}

/// Strict-minimum winner, or `None` on a tie
pub fn strict_winner(durations: &[f64; 4]) -> Option<Algorithm> {
    let min = durations.iter().copied().fold(f64::INFINITY, f64::min);
    let mut winners = CANDIDATES
        .iter()
        .zip(durations)
        .filter(|(_, d)| **d == min)
        .map(|(a, _)| *a);
    match (winners.next(), winners.next()) {
        (Some(winner), None) => Some(winner),
        _ => None,
    }
}

/// First candidate strictly below mean minus sample standard deviation
pub fn significant_winner(durations: &[f64; 4]) -> Option<Algorithm> {
    let n = durations.len() as f64;
    let mean = durations.iter().sum::<f64>() / n;
    let variance = durations.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let threshold = mean - variance.sqrt();

    CANDIDATES
        .iter()
        .zip(durations)
        .find(|(_, d)| **d < threshold)
        .map(|(a, _)| *a)
}

fn tally(
    counts: &BTreeMap<String, usize>,
    labels: &[&str],
    total: usize,
    places: i32,
) -> Vec<TallyEntry> {
    let scale = 10f64.powi(places);
    labels
        .iter()
        .map(|label| {
            let count = counts.get(*label).copied().unwrap_or(0);
            let percent = if total == 0 {
                0.0
            } else {
                (count as f64 / total as f64 * 100.0 * scale).round() / scale
            };
            TallyEntry {
                label: label.to_string(),
                count,
                percent,
            }
        })
        .collect()
}

pub fn analyze(rows: &[AggregatedRow], floor: f64) -> FastestReport {
    let mut fastest: BTreeMap<String, usize> = BTreeMap::new();
    let mut significant: BTreeMap<String, usize> = BTreeMap::new();
    let mut outperformers = Vec::new();
    let mut eligible = 0;

    for row in rows {
        let Some(durations) = eligible_durations(row, floor) else {
            continue;
        };
        eligible += 1;

        let label = strict_winner(&durations).map_or(DRAW, |a| a.label());
        *fastest.entry(label.to_string()).or_insert(0) += 1;

        let winner = significant_winner(&durations);
        let label = winner.map_or(NO_WINNER, |a| a.label());
        *significant.entry(label.to_string()).or_insert(0) += 1;

        if let Some(algorithm) = winner.filter(|a| COMPARISON_ALGORITHMS.contains(a)) {
            if let (Some(last), Some(best)) = (row.duration(FINAL_ALGORITHM), row.best_other) {
                outperformers.push(Outperformer {
                    project: row.project.clone(),
                    algorithm,
                    ratio: last / best,
                });
            }
        }
    }

    outperformers.sort_by(|a, b| b.ratio.total_cmp(&a.ratio));

    let candidate_labels: Vec<&str> = CANDIDATES.iter().map(|a| a.label()).collect();
    let mut fastest_labels = candidate_labels.clone();
    fastest_labels.push(DRAW);
    let mut significant_labels = candidate_labels;
    significant_labels.push(NO_WINNER);

    tracing::info!(
        total = rows.len(),
        eligible,
        floor,
        "Projects eligible for the fastest-algorithm analysis"
    );

    FastestReport {
        total_projects: rows.len(),
        eligible_projects: eligible,
        floor_secs: floor,
        fastest: tally(&fastest, &fastest_labels, eligible, 1),
        significant: tally(&significant, &significant_labels, eligible, 2),
        outperformers,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::aggregate;
    use crate::record::MetricRecord;

    fn rows(projects: &[(&str, [f64; 5])]) -> Vec<AggregatedRow> {
        let mut records = Vec::new();
        for (project, durations) in projects {
            for (algorithm, duration) in ELIGIBILITY.iter().zip(durations) {
                let mut record = MetricRecord::new(*project, *algorithm);
                record.test_duration = Some(*duration);
                records.push(record);
            }
        }
        aggregate(&records)
    }

    fn count(entries: &[TallyEntry], label: &str) -> usize {
        entries.iter().find(|e| e.label == label).map_or(0, |e| e.count)
    }

    #[test]
    fn test_projects_below_floor_are_excluded() {
        let report = analyze(
            &rows(&[
                ("fast", [1.0, 2.0, 3.0, 4.0, 5.0]),
                ("edge", [6.0, 6.0, 6.0, 6.0, 5.0]),
                ("slow", [60.0, 70.0, 80.0, 90.0, 65.0]),
            ]),
            DEFAULT_FLOOR_SECS,
        );

        assert_eq!(report.total_projects, 3);
        assert_eq!(report.eligible_projects, 1);
        assert_eq!(count(&report.fastest, "D"), 1);
        assert_eq!(report.fastest.iter().map(|e| e.count).sum::<usize>(), 1);
    }

    #[test]
    fn test_three_way_tie_is_a_draw() {
        let report = analyze(&rows(&[("tie", [50.0, 10.0, 10.0, 10.0, 20.0])]), DEFAULT_FLOOR_SECS);

        assert_eq!(count(&report.fastest, "draw"), 1);
        for label in ["B", "C", "C+", "D"] {
            assert_eq!(count(&report.fastest, label), 0);
        }
    }

    #[test]
    fn test_significance_credits_clear_winner() {
        // mean 32.5, sample std ≈ 15, threshold ≈ 17.5
        let durations = [40.0, 40.0, 40.0, 10.0];
        assert_eq!(significant_winner(&durations), Some(Algorithm::D));
        assert_eq!(significant_winner(&[20.0, 20.0, 20.0, 20.0]), None);
    }

    #[test]
    fn test_percentages_and_outperformers() {
        let report = analyze(
            &rows(&[
                ("p1", [100.0, 10.0, 40.0, 40.0, 40.0]),
                ("p2", [100.0, 40.0, 40.0, 10.0, 80.0]),
                ("p3", [100.0, 30.0, 30.0, 30.0, 30.0]),
            ]),
            DEFAULT_FLOOR_SECS,
        );

        assert_eq!(report.eligible_projects, 3);
        let b = report.fastest.iter().find(|e| e.label == "B").unwrap();
        assert_eq!(b.count, 1);
        assert_eq!(b.percent, 33.3);
        assert_eq!(count(&report.fastest, "draw"), 1);
        assert_eq!(count(&report.significant, "None"), 1);
        let none = report.significant.iter().find(|e| e.label == "None").unwrap();
        assert_eq!(none.percent, 33.33);

        let order: Vec<&str> = report.outperformers.iter().map(|o| o.project.as_str()).collect();
        assert_eq!(order, vec!["p2", "p1"]);
        assert_eq!(report.outperformers[0].algorithm, Algorithm::CPlus);
        assert_eq!(report.outperformers[0].ratio, 8.0);
    }

    #[test]
    fn test_no_eligible_projects() {
        let report = analyze(&[], DEFAULT_FLOOR_SECS);
        assert_eq!(report.eligible_projects, 0);
        assert!(report.fastest.iter().all(|e| e.percent == 0.0));
        assert!(report.outperformers.is_empty());
    }
}
