//! Correctness comparison of every variant against the ORIGINAL baseline

use monbench_common::Algorithm;

use crate::problems::{ProblemKind, ProblemsCollector};
use crate::record::{Count, CountField, MetricRecord};

/// Fields that must match the baseline exactly.
///
/// `passed` is left out on purpose: instrumented runs may collect a
/// different number of passing tests without that being a monitoring bug.
pub const COMPARED_FIELDS: [CountField; 5] = [
    CountField::Failed,
    CountField::Skipped,
    CountField::XFailed,
    CountField::XPassed,
    CountField::Errors,
];

/// Compare all records of one project. Never fails; every mismatch becomes
/// a problem entry. Returns the number of problems recorded.
///
/// The reported `diff` is baseline minus candidate.
pub fn compare_project(
    project: &str,
    records: &[MetricRecord],
    problems: &ProblemsCollector,
) -> usize {
    let Some(baseline) = records.iter().find(|r| r.algorithm.is_baseline()) else {
        if !records.is_empty() {
            problems.add(
                project,
                Algorithm::Original,
                ProblemKind::MissingBaseline,
                "No ORIGINAL results to compare against",
            );
            return 1;
        }
        return 0;
    };

    let mut found = 0;
    for field in COMPARED_FIELDS {
        for candidate in records.iter().filter(|r| !r.algorithm.is_baseline()) {
            let original = baseline.count(field);
            let result = candidate.count(field);
            match (original.and_then(Count::value), result.and_then(Count::value)) {
                (Some(o), Some(r)) => {
                    if o == r {
                        continue;
                    }
                    let diff = o as i64 - r as i64;
                    problems.add(
                        project,
                        candidate.algorithm,
                        ProblemKind::Diff,
                        format!(
                            "DIFF: {} is different from ORIGINAL. diff={}",
                            field.name(),
                            diff
                        ),
                    );
                }
                _ => problems.add(
                    project,
                    candidate.algorithm,
                    ProblemKind::NonNumeric,
                    format!(
                        "Non-numeric or invalid data for comparison. \
                         Original: {}, Result: {}, Key: {}",
                        raw(original),
                        raw(result),
                        field.name()
                    ),
                ),
            }
            found += 1;
        }
    }
    found
}

fn raw(count: Option<&Count>) -> String {
    count.map(|c| c.to_string()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::TestCounts;

    fn record(algorithm: Algorithm, failed: Count) -> MetricRecord {
        let mut record = MetricRecord::new("alpha", algorithm);
        record.counts = Some(TestCounts {
            failed,
            passed: Count::Parsed(10),
            ..TestCounts::default()
        });
        record
    }

    #[test]
    fn test_diff_is_baseline_minus_candidate() {
        let problems = ProblemsCollector::new();
        let records = [
            record(Algorithm::Original, Count::Parsed(2)),
            record(Algorithm::B, Count::Parsed(3)),
        ];

        assert_eq!(compare_project("alpha", &records, &problems), 1);
        let entries = problems.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, ProblemKind::Diff);
        assert_eq!(entries[0].algorithm, Algorithm::B);
        assert_eq!(
            entries[0].message,
            "DIFF: failed is different from ORIGINAL. diff=-1"
        );
    }

    #[test]
    fn test_diff_sign_reversed() {
        let problems = ProblemsCollector::new();
        let records = [
            record(Algorithm::Original, Count::Parsed(3)),
            record(Algorithm::D, Count::Parsed(2)),
        ];

        compare_project("alpha", &records, &problems);
        assert!(problems.entries()[0].message.ends_with("diff=1"));
    }

    #[test]
    fn test_passed_is_not_compared() {
        let problems = ProblemsCollector::new();
        let baseline = record(Algorithm::Original, Count::Parsed(0));
        let mut candidate = record(Algorithm::C, Count::Parsed(0));
        if let Some(counts) = candidate.counts.as_mut() {
            counts.passed = Count::Parsed(99);
        }

        assert_eq!(compare_project("alpha", &[baseline, candidate], &problems), 0);
        assert!(problems.is_empty());
    }

    #[test]
    fn test_non_numeric_names_both_values() {
        let problems = ProblemsCollector::new();
        let records = [
            record(Algorithm::Original, Count::Parsed(1)),
            record(Algorithm::CPlus, Count::Unparsed("==".to_string())),
        ];

        compare_project("alpha", &records, &problems);
        let entry = &problems.entries()[0];
        assert_eq!(entry.kind, ProblemKind::NonNumeric);
        assert_eq!(
            entry.message,
            "Non-numeric or invalid data for comparison. Original: 1, Result: ==, Key: failed"
        );
    }

    #[test]
    fn test_missing_counts_are_non_numeric() {
        let problems = ProblemsCollector::new();
        let records = [
            record(Algorithm::Original, Count::Parsed(0)),
            MetricRecord::new("alpha", Algorithm::A),
        ];

        assert_eq!(compare_project("alpha", &records, &problems), 5);
        assert!(problems
            .entries()
            .iter()
            .all(|e| e.kind == ProblemKind::NonNumeric));
    }

    #[test]
    fn test_missing_baseline() {
        let problems = ProblemsCollector::new();
        let records = [record(Algorithm::B, Count::Parsed(0))];

        compare_project("alpha", &records, &problems);
        assert_eq!(problems.entries()[0].kind, ProblemKind::MissingBaseline);
        assert_eq!(compare_project("alpha", &[], &problems), 0);
    }
}
