//! Record store for parsed access-log lines.
//!
//! `RecordStore` persists [`ingest::ParsedRecord`]s in SQLite through a
//! bounded [`pool::ConnectionPool`]; the `logstore` binary wires it to the
//! command line.

pub mod cli;
pub mod config;
pub mod error;
pub mod filter;
pub mod pool;
pub mod records;
pub mod telemetry;

pub use config::StoreConfig;
pub use error::{StoreError, StoreResult};
pub use filter::FilterCriteria;
pub use pool::{ConnectionPool, PoolOptions, PoolStatus};
pub use records::{IpCount, LogSummary, RecordStore, StatusCount, StoredRecord};
