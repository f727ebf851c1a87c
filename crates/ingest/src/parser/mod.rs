/// Access-log line parsing and field validation
///
/// Turns one raw line of Apache/Nginx access-log text into a validated
/// [`ParsedRecord`], or a [`RejectReason`] naming the first check it failed.
///
/// # Architecture
///
/// - `traits.rs`: the `LineParser` seam driven by the batch ingestor
/// - `access_log.rs`: structural pattern match and field extraction
/// - `validate.rs`: IP syntax, severity and reason-phrase lookups
/// - `timestamp.rs`: ordered timestamp format fallback
/// - `model.rs`: records, levels and rejection reasons
///
/// Parsers hold no mutable state and never log; reporting is the caller's job.

pub mod traits;
pub mod access_log;
pub mod model;
pub mod timestamp;
pub mod validate;

// Re-export commonly used types
pub use traits::LineParser;
pub use access_log::{parse_line, AccessLogParser};
pub use model::{Level, ParsedRecord, RawLine, RejectReason};
pub use timestamp::parse_timestamp;
pub use validate::{classify_severity, is_valid_ipv4, reason_phrase};
