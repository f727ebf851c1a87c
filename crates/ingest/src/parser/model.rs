use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::validate::{classify_severity, is_valid_ipv4, reason_phrase};

/// Lowest status code accepted on a record.
pub const MIN_STATUS: u16 = 100;
/// Highest status code accepted on a record.
pub const MAX_STATUS: u16 = 599;

/// Severity derived from an HTTP status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    Info,
    Warning,
    Error,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Info => "INFO",
            Level::Warning => "WARNING",
            Level::Error => "ERROR",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown log level: {0}")]
pub struct UnknownLevel(pub String);

impl FromStr for Level {
    type Err = UnknownLevel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "INFO" => Ok(Level::Info),
            "WARNING" | "WARN" => Ok(Level::Warning),
            "ERROR" => Ok(Level::Error),
            _ => Err(UnknownLevel(s.to_string())),
        }
    }
}

/// One line of input text and its 1-based position in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawLine<'a> {
    pub number: usize,
    pub text: &'a str,
}

/// Why a non-blank line did not produce a record.
///
/// Each variant maps to exactly one [`ParseStats`](crate::ingest::ParseStats)
/// bucket. The offending field text is kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectReason {
    #[error("Line does not match the access-log pattern")]
    NoStructuralMatch,

    #[error("Invalid IP address: {0}")]
    InvalidIp(String),

    #[error("Unparseable timestamp: {0}")]
    UnparseableTimestamp(String),

    #[error("Status code out of range: {0}")]
    StatusOutOfRange(String),
}

impl RejectReason {
    /// Stable short name, used as a log field and JSON key.
    pub fn kind(&self) -> &'static str {
        match self {
            RejectReason::NoStructuralMatch => "no_structural_match",
            RejectReason::InvalidIp(_) => "invalid_ip",
            RejectReason::UnparseableTimestamp(_) => "unparseable_timestamp",
            RejectReason::StatusOutOfRange(_) => "status_out_of_range",
        }
    }
}

/// A validated access-log request.
///
/// Fields are private: a record only exists once ip, timestamp and status
/// have all been validated, and `level` / `response_text` are always the ones
/// derived from `status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedRecord {
    ip: String,
    timestamp: NaiveDateTime,
    status: u16,
    level: Level,
    response_text: String,
}

impl ParsedRecord {
    /// Validate the raw fields and derive severity and reason phrase.
    pub fn new(
        ip: impl Into<String>,
        timestamp: NaiveDateTime,
        status: u16,
    ) -> Result<Self, RejectReason> {
        let ip = ip.into();
        if !is_valid_ipv4(&ip) {
            return Err(RejectReason::InvalidIp(ip));
        }
        if !(MIN_STATUS..=MAX_STATUS).contains(&status) {
            return Err(RejectReason::StatusOutOfRange(status.to_string()));
        }

        Ok(Self {
            ip,
            timestamp,
            status,
            level: classify_severity(status),
            response_text: reason_phrase(status),
        })
    }

    pub fn ip(&self) -> &str {
        &self.ip
    }

    pub fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn response_text(&self) -> &str {
        &self.response_text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 12, 4)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_new_derives_level_and_phrase() {
        let record = ParsedRecord::new("10.0.0.1", ts(), 404).unwrap();
        assert_eq!(record.level(), Level::Warning);
        assert_eq!(record.response_text(), "Not Found");
        assert_eq!(record.ip(), "10.0.0.1");
        assert_eq!(record.timestamp(), ts());
    }

    #[test]
    fn test_new_rejects_bad_ip() {
        let err = ParsedRecord::new("256.0.0.1", ts(), 200).unwrap_err();
        assert_eq!(err, RejectReason::InvalidIp("256.0.0.1".into()));
    }

    #[test]
    fn test_new_rejects_status_bounds() {
        assert!(ParsedRecord::new("1.1.1.1", ts(), 99).is_err());
        assert!(ParsedRecord::new("1.1.1.1", ts(), 600).is_err());
        assert!(ParsedRecord::new("1.1.1.1", ts(), 100).is_ok());
        assert!(ParsedRecord::new("1.1.1.1", ts(), 599).is_ok());
    }

    #[test]
    fn test_level_round_trips_through_str() {
        for level in [Level::Info, Level::Warning, Level::Error] {
            assert_eq!(level.as_str().parse::<Level>().unwrap(), level);
        }
        assert_eq!("warn".parse::<Level>().unwrap(), Level::Warning);
        assert!("debug".parse::<Level>().is_err());
    }

    #[test]
    fn test_level_serializes_uppercase() {
        let json = serde_json::to_string(&Level::Warning).unwrap();
        assert_eq!(json, "\"WARNING\"");
    }
}
