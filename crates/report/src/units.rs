//! Memory unit conversion and memory-log summing

use std::sync::LazyLock;

use regex::Regex;

use monbench_common::{BenchError, BenchResult};

/// `Total memory allocated: <number><unit>`
static MEMORY_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Total memory allocated: (\d+\.?\d*)([a-zA-Z]+)").expect("valid memory regex")
});

/// Bytes per unit. Decimal-named units are 1024-based as well.
pub fn unit_factor(unit: &str) -> BenchResult<f64> {
    let factor: u64 = match unit {
        "B" => 1,
        "KB" | "KiB" => 1 << 10,
        "MB" | "MiB" => 1 << 20,
        "GB" | "GiB" => 1 << 30,
        "TB" | "TiB" => 1 << 40,
        other => return Err(BenchError::UnknownUnit(other.to_string())),
    };
    Ok(factor as f64)
}

/// Convert a magnitude in `unit` to bytes
pub fn to_bytes(value: f64, unit: &str) -> BenchResult<f64> {
    Ok(value * unit_factor(unit)?)
}

/// Sum of all memory lines in a run log
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MemoryTotal {
    pub bytes: f64,
    /// Number of lines that matched
    pub lines: usize,
}

/// Sum every `Total memory allocated` line; other lines contribute nothing
pub fn sum_memory_lines(text: &str) -> BenchResult<MemoryTotal> {
    let mut total = MemoryTotal {
        bytes: 0.0,
        lines: 0,
    };
    for line in text.lines() {
        let Some(caps) = MEMORY_LINE.captures(line) else {
            continue;
        };
        let value: f64 = caps[1]
            .parse()
            .map_err(|e| BenchError::malformed("memory log", e))?;
        total.bytes += to_bytes(value, &caps[2])?;
        total.lines += 1;
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    const UNITS: [&str; 9] = ["B", "KB", "MB", "GB", "TB", "KiB", "MiB", "GiB", "TiB"];

    #[test]
    fn test_conversion_is_linear_in_value() {
        for unit in UNITS {
            let factor = unit_factor(unit).unwrap();
            assert_eq!(to_bytes(0.0, unit).unwrap(), 0.0);
            assert_eq!(to_bytes(1.0, unit).unwrap(), factor);
            assert_eq!(to_bytes(3.5, unit).unwrap(), 3.5 * factor);
        }
    }

    #[test]
    fn test_decimal_names_are_binary() {
        assert_eq!(unit_factor("KB").unwrap(), unit_factor("KiB").unwrap());
        assert_eq!(unit_factor("GB").unwrap(), 1024.0 * 1024.0 * 1024.0);
    }

    #[test]
    fn test_unknown_unit() {
        let err = to_bytes(1.0, "PB").unwrap_err();
        assert!(matches!(err, BenchError::UnknownUnit(ref u) if u == "PB"));
        assert!(unit_factor("kb").is_err());
    }

    #[test]
    fn test_sum_memory_lines() {
        let log = "\
collected 3 items
Total memory allocated: 1.5KB
tests/test_a.py ...
Total memory allocated: 2MiB
Total memory allocated: bogus
";
        let total = sum_memory_lines(log).unwrap();
        assert_eq!(total.lines, 2);
        assert_eq!(total.bytes, 1.5 * 1024.0 + 2.0 * 1024.0 * 1024.0);
    }

    #[test]
    fn test_sum_without_memory_lines() {
        let total = sum_memory_lines("1 passed in 0.1s").unwrap();
        assert_eq!(total.lines, 0);
        assert_eq!(total.bytes, 0.0);
    }

    #[test]
    fn test_sum_rejects_unknown_unit() {
        assert!(sum_memory_lines("Total memory allocated: 3PB").is_err());
    }
}
