//! Progress extraction from fetch tool output lines.

use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};

static PERCENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+(?:\.\d+)?)%").unwrap());
static TOTAL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bof\s+~?\s*(\S+)").unwrap());
static SPEED_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bat\s+(\S+/s)").unwrap());
static ETA_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bETA\s+(\S+)").unwrap());

/// Returns the first percentage in `line`, or `None` if there is none.
pub fn parse_progress(line: &str) -> Option<f64> {
    PERCENT_RE
        .captures(line)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

/// Parsed `[download]` progress line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub percent: f64,
    /// Total size as printed, e.g. `10.00MiB`.
    pub total: Option<String>,
    /// Transfer rate as printed, e.g. `1.00MiB/s`.
    pub speed: Option<String>,
    pub eta: Option<String>,
}

impl ProgressSnapshot {
    /// Parses a progress line. Returns `None` when the line has no percentage.
    pub fn parse(line: &str) -> Option<Self> {
        let percent = parse_progress(line)?;
        let capture = |re: &Regex| {
            re.captures(line)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().to_string())
        };

        Some(Self {
            percent,
            total: capture(&TOTAL_RE),
            speed: capture(&SPEED_RE),
            eta: capture(&ETA_RE),
        })
    }

    /// Percentage clamped to `0.0..=1.0`, for progress bars.
    pub fn fraction(&self) -> f64 {
        (self.percent / 100.0).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_progress_fractional() {
        assert_eq!(parse_progress("[download]  42.5% of 10.00MiB"), Some(42.5));
    }

    #[test]
    fn test_parse_progress_whole_number() {
        assert_eq!(parse_progress("[download] 100% of 10MiB"), Some(100.0));
    }

    #[test]
    fn test_parse_progress_absent() {
        assert_eq!(parse_progress("[youtube] abc: Downloading webpage"), None);
        assert_eq!(parse_progress("100 percent"), None);
    }

    #[test]
    fn test_parse_progress_zero_is_some() {
        assert_eq!(parse_progress("[download]   0.0% of 3.2MiB"), Some(0.0));
    }

    #[test]
    fn test_snapshot_full_line() {
        let snapshot =
            ProgressSnapshot::parse("[download]  42.5% of ~ 10.00MiB at  1.25MiB/s ETA 00:05")
                .unwrap();
        assert_eq!(snapshot.percent, 42.5);
        assert_eq!(snapshot.total.as_deref(), Some("10.00MiB"));
        assert_eq!(snapshot.speed.as_deref(), Some("1.25MiB/s"));
        assert_eq!(snapshot.eta.as_deref(), Some("00:05"));
        assert!((snapshot.fraction() - 0.425).abs() < 1e-9);
    }

    #[test]
    fn test_snapshot_partial_line() {
        let snapshot = ProgressSnapshot::parse("[download] 100% of 10MiB").unwrap();
        assert_eq!(snapshot.total.as_deref(), Some("10MiB"));
        assert!(snapshot.speed.is_none());
        assert!(snapshot.eta.is_none());
        assert_eq!(snapshot.fraction(), 1.0);
    }

    #[test]
    fn test_snapshot_none_without_percent() {
        assert!(ProgressSnapshot::parse("[Merger] Merging formats into \"a.mp4\"").is_none());
    }
}
