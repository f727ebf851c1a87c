use super::model::Level;

/// Canonical reason phrases for the status codes seen most often.
const REASON_PHRASES: &[(u16, &str)] = &[
    (200, "OK"),
    (201, "Created"),
    (204, "No Content"),
    (301, "Moved Permanently"),
    (302, "Found"),
    (304, "Not Modified"),
    (400, "Bad Request"),
    (401, "Unauthorized"),
    (403, "Forbidden"),
    (404, "Not Found"),
    (500, "Internal Server Error"),
    (502, "Bad Gateway"),
    (503, "Service Unavailable"),
    (504, "Gateway Timeout"),
];

/// Map a status code to its severity.
///
/// 400 itself is `Info`; dashboards built on this data depend on that boundary.
pub fn classify_severity(status: u16) -> Level {
    if status <= 400 {
        Level::Info
    } else if status < 500 {
        Level::Warning
    } else {
        Level::Error
    }
}

/// Human-readable phrase for a status code, `"HTTP <code>"` when unknown.
pub fn reason_phrase(status: u16) -> String {
    REASON_PHRASES
        .iter()
        .find(|(code, _)| *code == status)
        .map(|(_, phrase)| phrase.to_string())
        .unwrap_or_else(|| format!("HTTP {}", status))
}

/// Dotted-quad check: exactly four segments, each an integer in 0..=255.
pub fn is_valid_ipv4(text: &str) -> bool {
    let segments: Vec<&str> = text.split('.').collect();
    if segments.len() != 4 {
        return false;
    }

    segments.iter().all(|segment| {
        segment
            .parse::<i64>()
            .map(|octet| (0..=255).contains(&octet))
            .unwrap_or(false)
    })
}
