use chrono::{Duration, NaiveDate, NaiveDateTime};
use rand::seq::IndexedRandom;
use rand::Rng;

const IPS: &[&str] = &["192.168.1.100", "10.0.0.50", "172.16.0.1", "203.0.113.45", "8.8.8.8"];
const METHODS: &[&str] = &["GET", "POST", "PUT", "DELETE"];
const PATHS: &[&str] = &["/index.html", "/api/users", "/login", "/dashboard", "/images/logo.png"];
// 200 is weighted by repetition
const STATUSES: &[u16] = &[200, 200, 200, 404, 500, 403, 301];

/// Seconds between consecutive generated lines.
pub const LINE_INTERVAL_SECS: i64 = 10;

fn base_time() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 12, 4)
        .and_then(|d| d.and_hms_opt(10, 0, 0))
        .unwrap_or_default()
}

/// Generate `lines` well-formed access-log lines joined by `\n`.
///
/// Timestamps start at 2025-12-04 10:00:00 and advance by
/// [`LINE_INTERVAL_SECS`]; every line carries a `+0700` offset.
pub fn generate_sample_log<R: Rng + ?Sized>(lines: usize, rng: &mut R) -> String {
    let base = base_time();

    (0..lines)
        .map(|i| {
            let timestamp = base + Duration::seconds(i as i64 * LINE_INTERVAL_SECS);
            format!(
                r#"{} - - [{} +0700] "{} {} HTTP/1.1" {} {}"#,
                IPS.choose(rng).unwrap_or(&IPS[0]),
                timestamp.format("%d/%b/%Y:%H:%M:%S"),
                METHODS.choose(rng).unwrap_or(&METHODS[0]),
                PATHS.choose(rng).unwrap_or(&PATHS[0]),
                STATUSES.choose(rng).unwrap_or(&STATUSES[0]),
                rng.random_range(100..=5000),
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
