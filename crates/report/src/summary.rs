//! Test-runner summary line location and parsing.
//!
//! The summary line is the human-oriented last line pytest prints, e.g.
//! `===== 1 failed, 12 passed, 2 skipped in 3.21s =====`. Its shape is an
//! external format contract; everything that depends on it lives here.

use std::sync::LazyLock;

use regex::{Regex, RegexBuilder};

use monbench_common::{BenchError, BenchResult};

use crate::record::{strip_ansi, Count, CountField, TestCounts};

/// Default number of trailing lines searched when the last line does not qualify
pub const DEFAULT_SCAN_LINES: usize = 500;

static OUTCOME_KEYWORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(passed|errors|error)\b").expect("valid keyword regex"));

static STRUCTURAL_FAILURE: LazyLock<Regex> = LazyLock::new(|| {
    RegexBuilder::new("fatal|segmentation fault|core dump")
        .case_insensitive(true)
        .build()
        .expect("valid failure regex")
});

/// Leading and trailing context for structural failure regions
const CONTEXT_BEFORE: usize = 5;
const CONTEXT_AFTER: usize = 10;

/// Counts and elapsed time from one summary line
#[derive(Debug, Clone, PartialEq)]
pub struct TestSummary {
    pub counts: TestCounts,
    /// Seconds
    pub time: f64,
}

/// Whether `line` looks like the final pytest summary
pub fn qualifies(line: &str) -> bool {
    line.contains("in")
        && line.contains('=')
        && OUTCOME_KEYWORD.is_match(line)
        && !line.contains("WARNING")
}

/// Find the summary line: the final line if it qualifies, otherwise the
/// last qualifying line among the trailing `scan_lines` lines.
pub fn locate_summary_line(text: &str, scan_lines: usize) -> BenchResult<&str> {
    let trimmed = text.trim();
    let lines: Vec<&str> = trimmed.lines().collect();

    if let Some(last) = lines.last() {
        if qualifies(last) {
            return Ok(*last);
        }
    }

    let start = lines.len().saturating_sub(scan_lines);
    lines[start..]
        .iter()
        .rev()
        .find(|line| qualifies(line))
        .copied()
        .ok_or(BenchError::SummaryNotFound)
}

/// Parse counts and time out of a summary line
pub fn parse_summary_line(line: &str) -> BenchResult<TestSummary> {
    let clean = strip_ansi(line);
    let time = parse_time(&clean)?;

    let mut counts = TestCounts::default();
    for segment in clean.split(',') {
        let Some(field) = segment_field(segment) else {
            continue;
        };
        *counts.get_mut(field) = segment_count(segment);
    }

    Ok(TestSummary { counts, time })
}

/// Locate and parse in one step
pub fn parse_output(text: &str, scan_lines: usize) -> BenchResult<TestSummary> {
    parse_summary_line(locate_summary_line(text, scan_lines)?)
}

fn parse_time(line: &str) -> BenchResult<f64> {
    let malformed = || BenchError::malformed("summary time", format!("last_line={}", line));
    let (_, after) = line.split_once("in ").ok_or_else(malformed)?;
    let raw = after.split('s').next().unwrap_or_default().trim();
    raw.parse().map_err(|_| malformed())
}

/// The count field named in a comma-separated segment.
///
/// The leading space keeps `passed` from matching inside `xpassed`.
fn segment_field(segment: &str) -> Option<CountField> {
    CountField::ALL.into_iter().find(|field| {
        let name = field.name();
        segment.contains(&format!(" {}", name))
            || (*field == CountField::Errors && segment.contains(" error"))
    })
}

/// Number paired with the keyword: the second space-separated token, or the
/// first when the second is not numeric (count/keyword order flipped).
fn segment_count(segment: &str) -> Count {
    let tokens: Vec<&str> = segment.split(' ').collect();
    let second = tokens.get(1).map(|t| Count::from_token(t));
    match second {
        Some(count @ Count::Parsed(_)) => count,
        _ => Count::from_token(tokens.first().copied().unwrap_or_default()),
    }
}

/// Regions around fatal/segfault/core-dump lines, grep `-B5 -A10` style.
///
/// Overlapping windows are merged; disjoint ones are separated by `--`.
pub fn structural_failures(text: &str) -> Option<String> {
    let lines: Vec<&str> = text.lines().collect();
    let mut windows: Vec<(usize, usize)> = Vec::new();

    for (i, line) in lines.iter().enumerate() {
        if !STRUCTURAL_FAILURE.is_match(line) {
            continue;
        }
        let start = i.saturating_sub(CONTEXT_BEFORE);
        let end = (i + CONTEXT_AFTER).min(lines.len() - 1);
        match windows.last_mut() {
            Some(last) if start <= last.1 + 1 => last.1 = last.1.max(end),
            _ => windows.push((start, end)),
        }
    }

    if windows.is_empty() {
        return None;
    }

    let regions: Vec<String> = windows
        .iter()
        .map(|&(start, end)| lines[start..=end].join("\n"))
        .collect();
    Some(regions.join("\n--\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_summary() {
        let summary = parse_summary_line("1 failed, 12 passed, 2 skipped in 3.21s").unwrap();

        assert_eq!(summary.counts.failed, Count::Parsed(1));
        assert_eq!(summary.counts.passed, Count::Parsed(12));
        assert_eq!(summary.counts.skipped, Count::Parsed(2));
        assert_eq!(summary.counts.xfailed, Count::Parsed(0));
        assert_eq!(summary.counts.xpassed, Count::Parsed(0));
        assert_eq!(summary.counts.errors, Count::Parsed(0));
        assert_eq!(summary.time, 3.21);
    }

    #[test]
    fn test_parse_decorated_summary() {
        let line = "===== 3 passed, 1 xfailed, 2 xpassed, 1 error in 10.50s =====";
        let summary = parse_summary_line(line).unwrap();

        assert_eq!(summary.counts.passed, Count::Parsed(3));
        assert_eq!(summary.counts.xfailed, Count::Parsed(1));
        assert_eq!(summary.counts.xpassed, Count::Parsed(2));
        assert_eq!(summary.counts.errors, Count::Parsed(1));
        assert_eq!(summary.time, 10.5);
    }

    #[test]
    fn test_colored_tokens() {
        let line = concat!(
            "\x1b[31m===== \x1b[31m\x1b[1m2 failed\x1b[0m, ",
            "\x1b[32m5 passed\x1b[0m\x1b[31m in 0.40s\x1b[0m\x1b[31m =====\x1b[0m"
        );
        let summary = parse_summary_line(line).unwrap();

        assert_eq!(summary.counts.failed, Count::Parsed(2));
        assert_eq!(summary.counts.passed, Count::Parsed(5));
        assert_eq!(summary.time, 0.4);
    }

    #[test]
    fn test_unparseable_count_is_kept_raw() {
        let summary = parse_summary_line("== many failed, 4 passed in 1.0s ==").unwrap();
        assert_eq!(summary.counts.failed.value(), None);
        assert_eq!(summary.counts.passed, Count::Parsed(4));
    }

    #[test]
    fn test_missing_time_is_malformed() {
        let err = parse_summary_line("== 4 passed ==").unwrap_err();
        assert_eq!(err.error_code(), "MALFORMED_ARTIFACT");
    }

    #[test]
    fn test_final_line_wins() {
        let text = "== 1 passed in 0.1s ==\nsomething\n== 2 passed in 0.2s ==\n";
        assert_eq!(
            locate_summary_line(text, DEFAULT_SCAN_LINES).unwrap(),
            "== 2 passed in 0.2s =="
        );
    }

    #[test]
    fn test_falls_back_past_trailing_warning() {
        let mut text = String::from("collected 4 items\n");
        text.push_str("===== 4 passed in 2.00s =====\n");
        for i in 0..49 {
            text.push_str(&format!("teardown noise {}\n", i));
        }
        text.push_str("WARNING: 4 passed in = plugin leaked\n");

        let line = locate_summary_line(&text, DEFAULT_SCAN_LINES).unwrap();
        assert_eq!(line, "===== 4 passed in 2.00s =====");
        assert_eq!(parse_output(&text, DEFAULT_SCAN_LINES).unwrap().time, 2.0);
    }

    #[test]
    fn test_scan_window_is_bounded() {
        let mut text = String::from("== 1 passed in 1s ==\n");
        for _ in 0..10 {
            text.push_str("noise\n");
        }
        assert!(locate_summary_line(&text, 5).is_err());
        assert!(locate_summary_line(&text, 20).is_ok());
    }

    #[test]
    fn test_summary_not_found() {
        let err = locate_summary_line("collected 0 items\n", DEFAULT_SCAN_LINES).unwrap_err();
        assert!(matches!(err, BenchError::SummaryNotFound));
        assert!(locate_summary_line("", DEFAULT_SCAN_LINES).is_err());
    }

    #[test]
    fn test_qualifies() {
        assert!(qualifies("== 1 passed in 0.1s =="));
        assert!(qualifies("== 1 error in 0.1s =="));
        assert!(!qualifies("1 passed in 0.1s"));
        assert!(!qualifies("== WARNING 1 passed in 0.1s =="));
        assert!(!qualifies("== 1 xpassed in 0.1s =="));
    }

    #[test]
    fn test_structural_failures_context_and_separator() {
        let mut lines: Vec<String> = (0..40).map(|i| format!("line {}", i)).collect();
        lines[10] = "Fatal Python error: Aborted".to_string();
        lines[35] = "Segmentation fault (core dumped)".to_string();
        let text = lines.join("\n");

        let regions = structural_failures(&text).unwrap();
        let parts: Vec<&str> = regions.split("\n--\n").collect();
        assert_eq!(parts.len(), 2);
        assert!(parts[0].starts_with("line 5\n"));
        assert!(parts[0].ends_with("line 20"));
        assert!(parts[1].starts_with("line 30\n"));
        assert!(parts[1].ends_with("line 39"));
    }

    #[test]
    fn test_structural_failures_merge_overlaps() {
        let text = "a\nFATAL one\nb\ncore dump two\nc";
        let regions = structural_failures(text).unwrap();
        assert!(!regions.contains("--"));
        assert_eq!(regions, text);
        assert_eq!(structural_failures("all good\n"), None);
    }
}
