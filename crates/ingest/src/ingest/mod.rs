//! Batch ingestion: decode an uploaded file, parse every line, tally outcomes.

pub mod batch;
pub mod decode;
pub mod stats;

pub use batch::{ingest, BatchIngestor, IngestError, IngestReport, RejectedLine};
pub use decode::{decode, split_lines, TextEncoding};
pub use stats::{LineOutcome, ParseQuality, ParseStats};
