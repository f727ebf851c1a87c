// Access-log ingestion: line parsing, validation and per-batch statistics.

pub mod parser;
pub mod ingest;
pub mod sample;

pub use ingest::{BatchIngestor, IngestError, IngestReport, ParseStats};
pub use parser::{parse_line, Level, LineParser, ParsedRecord, RejectReason};
