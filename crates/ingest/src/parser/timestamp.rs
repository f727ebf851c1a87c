use chrono::NaiveDateTime;

/// Accepted layouts, in priority order, with the number of
/// whitespace-separated tokens each one spans. Text after those tokens
/// (a zone such as `+0700` or `PST`) is ignored.
pub const TIMESTAMP_FORMATS: &[(&str, usize)] = &[
    ("%d/%b/%Y:%H:%M:%S", 1), // 04/Dec/2025:10:00:00
    ("%d/%m/%Y:%H:%M:%S", 1), // 04/12/2025:10:00:00
    ("%Y-%m-%d %H:%M:%S", 2), // 2025-12-04 10:00:00
    ("%d-%b-%Y %H:%M:%S", 2), // 04-Dec-2025 10:00:00
];

/// Parse a raw time field into a naive date-time. The first layout that
/// parses wins; any zone suffix is dropped, never applied.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let tokens: Vec<&str> = raw.split_whitespace().collect();

    TIMESTAMP_FORMATS.iter().find_map(|(format, span)| {
        let head = tokens.get(..*span)?.join(" ");
        NaiveDateTime::parse_from_str(&head, format).ok()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn expected() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 12, 4)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_apache_format_with_offset() {
        assert_eq!(parse_timestamp("04/Dec/2025:10:00:00 +0700"), Some(expected()));
        assert_eq!(parse_timestamp("04/Dec/2025:10:00:00 -05:00"), Some(expected()));
    }

    #[test]
    fn test_apache_format_without_offset() {
        assert_eq!(parse_timestamp("04/Dec/2025:10:00:00"), Some(expected()));
    }

    #[test]
    fn test_numeric_month_format() {
        assert_eq!(parse_timestamp("04/12/2025:10:00:00 +0000"), Some(expected()));
    }

    #[test]
    fn test_iso_like_format() {
        assert_eq!(parse_timestamp("2025-12-04 10:00:00"), Some(expected()));
        assert_eq!(parse_timestamp("2025-12-04 10:00:00 UTC"), Some(expected()));
    }

    #[test]
    fn test_dashed_month_name_format() {
        assert_eq!(parse_timestamp("04-Dec-2025 10:00:00"), Some(expected()));
    }

    #[test]
    fn test_unparseable() {
        assert_eq!(parse_timestamp("yesterday"), None);
        assert_eq!(parse_timestamp("32/Dec/2025:10:00:00"), None);
        assert_eq!(parse_timestamp("04/Foo/2025:10:00:00 +0700"), None);
        assert_eq!(parse_timestamp(""), None);
    }

    #[test]
    fn test_any_zone_suffix_is_ignored() {
        assert_eq!(parse_timestamp("04/Dec/2025:10:00:00 PST"), Some(expected()));
        assert_eq!(parse_timestamp("04/Dec/2025:10:00:00 +07"), Some(expected()));
        assert_eq!(parse_timestamp("04-Dec-2025 10:00:00 CET"), Some(expected()));
    }

    #[test]
    fn test_surrounding_whitespace() {
        assert_eq!(parse_timestamp("  04/Dec/2025:10:00:00  "), Some(expected()));
        assert_eq!(parse_timestamp("2025-12-04   10:00:00"), Some(expected()));
    }
}
