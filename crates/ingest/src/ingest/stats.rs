use serde::Serialize;

use crate::parser::RejectReason;

/// Success-rate tier for a finished ingestion run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseQuality {
    /// 90 % or more of all lines parsed
    Good,
    /// 70 % up to 90 %
    Fair,
    /// below 70 %
    Poor,
}

/// What happened to a single input line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineOutcome<'a> {
    Blank,
    Parsed,
    Rejected(&'a RejectReason),
}

/// Per-run line counters.
///
/// Every line lands in exactly one bucket, so
/// `total_lines == parsed_success + total_rejections() + empty_lines`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ParseStats {
    pub total_lines: u64,
    pub parsed_success: u64,
    /// lines that did not match the structural pattern
    pub parse_errors: u64,
    pub invalid_ips: u64,
    pub timestamp_errors: u64,
    pub invalid_status: u64,
    pub empty_lines: u64,
}

impl ParseStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one line. Returns the bucket's new value.
    pub fn record(&mut self, outcome: LineOutcome<'_>) -> u64 {
        self.total_lines += 1;

        let bucket = match outcome {
            LineOutcome::Blank => &mut self.empty_lines,
            LineOutcome::Parsed => &mut self.parsed_success,
            LineOutcome::Rejected(RejectReason::NoStructuralMatch) => &mut self.parse_errors,
            LineOutcome::Rejected(RejectReason::InvalidIp(_)) => &mut self.invalid_ips,
            LineOutcome::Rejected(RejectReason::UnparseableTimestamp(_)) => {
                &mut self.timestamp_errors
            }
            LineOutcome::Rejected(RejectReason::StatusOutOfRange(_)) => &mut self.invalid_status,
        };
        *bucket += 1;
        *bucket
    }

    pub fn total_rejections(&self) -> u64 {
        self.parse_errors + self.invalid_ips + self.timestamp_errors + self.invalid_status
    }

    /// Whether every line is accounted for in exactly one bucket.
    pub fn is_balanced(&self) -> bool {
        self.total_lines == self.parsed_success + self.total_rejections() + self.empty_lines
    }

    /// Parsed lines as a percentage of all lines (blank lines included).
    pub fn success_rate(&self) -> f64 {
        if self.total_lines == 0 {
            return 0.0;
        }
        self.parsed_success as f64 / self.total_lines as f64 * 100.0
    }

    pub fn quality(&self) -> ParseQuality {
        let rate = self.success_rate();
        if rate >= 90.0 {
            ParseQuality::Good
        } else if rate >= 70.0 {
            ParseQuality::Fair
        } else {
            ParseQuality::Poor
        }
    }

    pub fn rejections_exceed_successes(&self) -> bool {
        self.total_rejections() > self.parsed_success
    }
}
