use std::sync::LazyLock;

use regex::Regex;

use super::model::{ParsedRecord, RejectReason, MAX_STATUS, MIN_STATUS};
use super::timestamp::parse_timestamp;
use super::traits::LineParser;
use super::validate::is_valid_ipv4;

// Format: ip - - [time] "METHOD /path HTTP/x.x" status size
// Example: 192.168.1.1 - - [04/Dec/2025:10:00:00 +0700] "GET /index.html HTTP/1.1" 200 1024
static ACCESS_LOG_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?P<ip>\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}) ",
        r"- - ",
        r"\[(?P<time>[^\]]+)\] ",
        r#""(?P<method>\w+) "#,
        r"(?P<path>\S+) ",
        r#"HTTP/[0-9.]+" "#,
        r"(?P<status>\d{3}) ",
        r"(?P<size>\d+|-)",
    ))
    .expect("access log pattern is a valid regex")
});

/// Parser for Apache/Nginx access-log lines.
///
/// The pattern is searched anywhere in the line, so combined-log trailers
/// (referrer, user agent) are tolerated. Checks run structure, IP, timestamp,
/// status, and the first failure decides the [`RejectReason`].
#[derive(Debug, Default, Clone, Copy)]
pub struct AccessLogParser;

impl LineParser for AccessLogParser {
    fn parse(&self, line: &str) -> Result<ParsedRecord, RejectReason> {
        let caps = ACCESS_LOG_PATTERN
            .captures(line)
            .ok_or(RejectReason::NoStructuralMatch)?;

        let ip = &caps["ip"];
        if !is_valid_ipv4(ip) {
            return Err(RejectReason::InvalidIp(ip.to_string()));
        }

        let time = &caps["time"];
        let timestamp = parse_timestamp(time)
            .ok_or_else(|| RejectReason::UnparseableTimestamp(time.to_string()))?;

        let raw_status = &caps["status"];
        let status = raw_status
            .parse::<u16>()
            .ok()
            .filter(|code| (MIN_STATUS..=MAX_STATUS).contains(code))
            .ok_or_else(|| RejectReason::StatusOutOfRange(raw_status.to_string()))?;

        ParsedRecord::new(ip, timestamp, status)
    }
}

/// Parse a single line with the default [`AccessLogParser`].
pub fn parse_line(line: &str) -> Result<ParsedRecord, RejectReason> {
    AccessLogParser.parse(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::model::Level;
    use chrono::NaiveDate;

    const SAMPLE: &str =
        r#"192.168.1.1 - - [04/Dec/2025:10:00:00 +0700] "GET /index.html HTTP/1.1" 200 1024"#;

    fn line_with_status(status: &str) -> String {
        format!(
            r#"10.0.0.1 - - [04/Dec/2025:10:00:00 +0700] "GET /x HTTP/1.1" {} 512"#,
            status
        )
    }

    #[test]
    fn test_parse_common_log_format() {
        let record = parse_line(SAMPLE).unwrap();
        assert_eq!(record.ip(), "192.168.1.1");
        assert_eq!(record.status(), 200);
        assert_eq!(record.level(), Level::Info);
        assert_eq!(record.response_text(), "OK");
        assert_eq!(
            record.timestamp(),
            NaiveDate::from_ymd_opt(2025, 12, 4)
                .unwrap()
                .and_hms_opt(10, 0, 0)
                .unwrap()
        );
    }

    #[test]
    fn test_parse_combined_log_format() {
        let line = r#"127.0.0.1 - - [29/Jan/2026:10:59:12 +0000] "POST /api/v1/data HTTP/1.1" 201 - "https://example.com" "curl/7.68.0""#;
        let record = parse_line(line).unwrap();
        assert_eq!(record.status(), 201);
        assert_eq!(record.response_text(), "Created");
    }

    #[test]
    fn test_level_boundaries_through_parser() {
        assert_eq!(parse_line(&line_with_status("400")).unwrap().level(), Level::Info);
        assert_eq!(parse_line(&line_with_status("401")).unwrap().level(), Level::Warning);
        assert_eq!(parse_line(&line_with_status("500")).unwrap().level(), Level::Error);
    }

    #[test]
    fn test_no_structural_match() {
        assert_eq!(
            parse_line("Just some random text without brackets"),
            Err(RejectReason::NoStructuralMatch)
        );
        // status must be three digits
        assert_eq!(
            parse_line(&line_with_status("20")),
            Err(RejectReason::NoStructuralMatch)
        );
    }

    #[test]
    fn test_invalid_ip() {
        let line = SAMPLE.replace("192.168.1.1", "999.1.1.1");
        assert_eq!(
            parse_line(&line),
            Err(RejectReason::InvalidIp("999.1.1.1".into()))
        );
    }

    #[test]
    fn test_unparseable_timestamp() {
        let line = SAMPLE.replace("04/Dec/2025:10:00:00", "04/Foo/2025:10:00:00");
        assert!(matches!(
            parse_line(&line),
            Err(RejectReason::UnparseableTimestamp(_))
        ));
    }

    #[test]
    fn test_status_out_of_range() {
        assert_eq!(
            parse_line(&line_with_status("999")),
            Err(RejectReason::StatusOutOfRange("999".into()))
        );
        assert_eq!(
            parse_line(&line_with_status("099")),
            Err(RejectReason::StatusOutOfRange("099".into()))
        );
    }

    #[test]
    fn test_earliest_failure_wins() {
        // bad IP, bad timestamp and bad status at once
        let line = r#"999.1.1.1 - - [nonsense] "GET / HTTP/1.1" 999 0"#;
        assert!(matches!(parse_line(line), Err(RejectReason::InvalidIp(_))));

        let line = r#"1.1.1.1 - - [nonsense] "GET / HTTP/1.1" 999 0"#;
        assert!(matches!(
            parse_line(line),
            Err(RejectReason::UnparseableTimestamp(_))
        ));
    }

    #[test]
    fn test_parse_is_idempotent() {
        assert_eq!(parse_line(SAMPLE), parse_line(SAMPLE));
    }
}
