use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::decode::{decode, split_lines, TextEncoding};
use super::stats::{LineOutcome, ParseQuality, ParseStats};
use crate::parser::{AccessLogParser, LineParser, ParsedRecord, RawLine, RejectReason};

/// Rejected lines kept (and logged) per reason before going quiet.
pub const DIAGNOSTICS_PER_REASON: usize = 3;

/// Layout hint logged when a file is mostly unparseable.
pub const EXPECTED_LINE_EXAMPLE: &str =
    r#"127.0.0.1 - - [04/Dec/2025:10:00:00 +0700] "GET /index.html HTTP/1.1" 200 1024"#;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Failed to read input: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A rejected line kept for diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct RejectedLine {
    pub line_number: usize,
    pub kind: &'static str,
    pub message: String,
    #[serde(skip)]
    pub reason: RejectReason,
}

impl RejectedLine {
    fn new(line_number: usize, reason: RejectReason) -> Self {
        Self {
            line_number,
            kind: reason.kind(),
            message: reason.to_string(),
            reason,
        }
    }
}

/// Result of one ingestion run.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    /// Parsed records, in input line order
    pub records: Vec<ParsedRecord>,
    pub stats: ParseStats,
    pub encoding: TextEncoding,
    /// First few rejected lines per reason
    pub rejections: Vec<RejectedLine>,
}

impl IngestReport {
    fn empty(encoding: TextEncoding) -> Self {
        Self {
            records: Vec::new(),
            stats: ParseStats::new(),
            encoding,
            rejections: Vec::new(),
        }
    }
}

/// Drives a [`LineParser`] over a whole input, line by line, in order.
///
/// Holds no per-run state, so one ingestor can be reused, and separate
/// instances can run on separate threads.
#[derive(Debug, Clone)]
pub struct BatchIngestor<P = AccessLogParser> {
    parser: P,
    diagnostics_per_reason: usize,
}

impl BatchIngestor<AccessLogParser> {
    pub fn new() -> Self {
        Self::with_parser(AccessLogParser)
    }
}

impl Default for BatchIngestor<AccessLogParser> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: LineParser> BatchIngestor<P> {
    pub fn with_parser(parser: P) -> Self {
        Self {
            parser,
            diagnostics_per_reason: DIAGNOSTICS_PER_REASON,
        }
    }

    pub fn diagnostics_per_reason(mut self, limit: usize) -> Self {
        self.diagnostics_per_reason = limit;
        self
    }

    /// Decode and parse a whole input. Malformed lines only affect the stats.
    pub fn ingest(&self, raw: &[u8]) -> IngestReport {
        let (text, encoding) = decode(raw);
        if encoding == TextEncoding::Latin1 {
            info!("Input is not valid UTF-8, decoded as {}", encoding.as_str());
        }

        let mut report = IngestReport::empty(encoding);
        for (index, text) in split_lines(&text).enumerate() {
            self.ingest_line(RawLine { number: index + 1, text }, &mut report);
        }

        log_summary(&report.stats);
        report
    }

    pub fn ingest_reader<R: Read>(&self, mut reader: R) -> Result<IngestReport, IngestError> {
        let mut raw = Vec::new();
        reader.read_to_end(&mut raw)?;
        Ok(self.ingest(&raw))
    }

    pub fn ingest_path(&self, path: impl AsRef<Path>) -> Result<IngestReport, IngestError> {
        let path = path.as_ref();
        let read_err = |source| IngestError::ReadFile {
            path: path.to_path_buf(),
            source,
        };

        let mut raw = Vec::new();
        File::open(path)
            .and_then(|mut file| file.read_to_end(&mut raw))
            .map_err(read_err)?;

        debug!("Read {} bytes from {}", raw.len(), path.display());
        Ok(self.ingest(&raw))
    }

    fn ingest_line(&self, line: RawLine<'_>, report: &mut IngestReport) {
        let text = line.text.trim();
        if text.is_empty() {
            report.stats.record(LineOutcome::Blank);
            return;
        }

        match self.parser.parse(text) {
            Ok(record) => {
                report.stats.record(LineOutcome::Parsed);
                report.records.push(record);
            }
            Err(reason) => {
                let seen = report.stats.record(LineOutcome::Rejected(&reason));
                if seen <= self.diagnostics_per_reason as u64 {
                    warn!(line = line.number, reason = reason.kind(), "{}", reason);
                    report.rejections.push(RejectedLine::new(line.number, reason));
                }
            }
        }
    }
}

/// Parse raw bytes with the default access-log parser.
pub fn ingest(raw: &[u8]) -> IngestReport {
    BatchIngestor::new().ingest(raw)
}

fn log_summary(stats: &ParseStats) {
    if stats.total_lines == 0 {
        debug!("Input contained no lines");
        return;
    }

    info!(
        total = stats.total_lines,
        parsed = stats.parsed_success,
        empty = stats.empty_lines,
        pattern_mismatch = stats.parse_errors,
        invalid_ip = stats.invalid_ips,
        bad_timestamp = stats.timestamp_errors,
        invalid_status = stats.invalid_status,
        "Parsed {:.1}% of lines",
        stats.success_rate()
    );

    if stats.quality() == ParseQuality::Poor {
        warn!("Low parse success rate ({:.1}%)", stats.success_rate());
    }
    if stats.rejections_exceed_successes() {
        warn!(
            "More lines rejected ({}) than parsed ({}); expected layout: {}",
            stats.total_rejections(),
            stats.parsed_success,
            EXPECTED_LINE_EXAMPLE
        );
    }
}
