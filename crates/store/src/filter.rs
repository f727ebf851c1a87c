use chrono::NaiveDateTime;
use ingest::{Level, ParsedRecord};
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};

use crate::records::format_timestamp;

/// Criteria for [`RecordStore::scan_filtered`](crate::records::RecordStore::scan_filtered).
///
/// Every field is optional; the set fields are ANDed together and an unset
/// field imposes no constraint. Ranges are inclusive on both ends.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterCriteria {
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
    pub level: Option<Level>,
    pub ip: Option<String>,
    pub min_status: Option<u16>,
    pub max_status: Option<u16>,
}

impl FilterCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn since(mut self, start: NaiveDateTime) -> Self {
        self.start = Some(start);
        self
    }

    pub fn until(mut self, end: NaiveDateTime) -> Self {
        self.end = Some(end);
        self
    }

    pub fn level(mut self, level: Level) -> Self {
        self.level = Some(level);
        self
    }

    pub fn ip(mut self, ip: impl Into<String>) -> Self {
        self.ip = Some(ip.into());
        self
    }

    pub fn min_status(mut self, status: u16) -> Self {
        self.min_status = Some(status);
        self
    }

    pub fn max_status(mut self, status: u16) -> Self {
        self.max_status = Some(status);
        self
    }

    pub fn status_between(self, min: u16, max: u16) -> Self {
        self.min_status(min).max_status(max)
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Same predicate as the SQL form, evaluated in memory.
    pub fn matches(&self, record: &ParsedRecord) -> bool {
        self.start.map_or(true, |start| record.timestamp() >= start)
            && self.end.map_or(true, |end| record.timestamp() <= end)
            && self.level.map_or(true, |level| record.level() == level)
            && self.ip.as_deref().map_or(true, |ip| record.ip() == ip)
            && self.min_status.map_or(true, |min| record.status() >= min)
            && self.max_status.map_or(true, |max| record.status() <= max)
    }

    /// Build a `WHERE` clause (empty when nothing is set) and its bound values.
    pub(crate) fn to_sql(&self) -> (String, Vec<Value>) {
        let mut clauses: Vec<&'static str> = Vec::new();
        let mut params: Vec<Value> = Vec::new();

        if let Some(start) = self.start {
            clauses.push("timestamp >= ?");
            params.push(Value::Text(format_timestamp(start)));
        }
        if let Some(end) = self.end {
            clauses.push("timestamp <= ?");
            params.push(Value::Text(format_timestamp(end)));
        }
        if let Some(level) = self.level {
            clauses.push("log_level = ?");
            params.push(Value::Text(level.as_str().to_string()));
        }
        if let Some(ip) = &self.ip {
            clauses.push("ip_address = ?");
            params.push(Value::Text(ip.clone()));
        }
        if let Some(min) = self.min_status {
            clauses.push("status >= ?");
            params.push(Value::Integer(i64::from(min)));
        }
        if let Some(max) = self.max_status {
            clauses.push("status <= ?");
            params.push(Value::Integer(i64::from(max)));
        }

        if clauses.is_empty() {
            (String::new(), params)
        } else {
            (format!(" WHERE {}", clauses.join(" AND ")), params)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 12, 4)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn record(ip: &str, hour: u32, status: u16) -> ParsedRecord {
        ParsedRecord::new(ip, at(hour), status).unwrap()
    }

    #[test]
    fn test_empty_criteria_matches_everything() {
        let criteria = FilterCriteria::new();
        assert!(criteria.is_empty());
        assert!(criteria.matches(&record("1.1.1.1", 1, 200)));
        assert_eq!(criteria.to_sql(), (String::new(), vec![]));
    }

    #[test]
    fn test_time_range_is_inclusive() {
        let criteria = FilterCriteria::new().since(at(10)).until(at(12));
        assert!(criteria.matches(&record("1.1.1.1", 10, 200)));
        assert!(criteria.matches(&record("1.1.1.1", 12, 200)));
        assert!(!criteria.matches(&record("1.1.1.1", 9, 200)));
        assert!(!criteria.matches(&record("1.1.1.1", 13, 200)));
    }

    #[test]
    fn test_fields_are_anded() {
        let criteria = FilterCriteria::new()
            .ip("10.0.0.1")
            .level(Level::Error)
            .status_between(500, 503);
        assert!(criteria.matches(&record("10.0.0.1", 1, 502)));
        assert!(!criteria.matches(&record("10.0.0.2", 1, 502)));
        assert!(!criteria.matches(&record("10.0.0.1", 1, 504)));
        assert!(!criteria.matches(&record("10.0.0.1", 1, 404)));
    }

    #[test]
    fn test_to_sql_only_uses_set_fields() {
        let (clause, params) = FilterCriteria::new()
            .level(Level::Warning)
            .min_status(400)
            .to_sql();
        assert_eq!(clause, " WHERE log_level = ? AND status >= ?");
        assert_eq!(
            params,
            vec![Value::Text("WARNING".into()), Value::Integer(400)]
        );
    }
}
