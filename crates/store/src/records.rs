use chrono::NaiveDateTime;
use ingest::ParsedRecord;
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Row, Transaction};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::error::{StoreError, StoreResult};
use crate::filter::FilterCriteria;
use crate::pool::ConnectionPool;

/// Stored timestamps are fixed-width text, so string order is time order.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.9f";

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS server_logs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        ip_address TEXT NOT NULL,
        timestamp TEXT NOT NULL,
        status INTEGER NOT NULL CHECK (status BETWEEN 100 AND 599),
        log_level TEXT NOT NULL CHECK (log_level IN ('INFO', 'WARNING', 'ERROR')),
        response TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_server_logs_timestamp ON server_logs(timestamp);
    CREATE INDEX IF NOT EXISTS idx_server_logs_ip ON server_logs(ip_address);
"#;

const INSERT_SQL: &str = "INSERT INTO server_logs (ip_address, timestamp, status, log_level, response) \
     VALUES (?1, ?2, ?3, ?4, ?5)";

const SELECT_SQL: &str = "SELECT id, ip_address, timestamp, status FROM server_logs";

const SUMMARY_SQL: &str = r#"
    SELECT
        COUNT(*),
        COUNT(DISTINCT ip_address),
        COALESCE(SUM(CASE WHEN log_level = 'ERROR' THEN 1 ELSE 0 END), 0),
        COALESCE(SUM(CASE WHEN log_level = 'WARNING' THEN 1 ELSE 0 END), 0),
        COALESCE(SUM(CASE WHEN log_level = 'INFO' THEN 1 ELSE 0 END), 0),
        MIN(timestamp),
        MAX(timestamp)
    FROM server_logs
"#;

pub(crate) fn format_timestamp(timestamp: NaiveDateTime) -> String {
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}

fn parse_timestamp_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDateTime> {
    let raw: String = row.get(idx)?;
    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%d %H:%M:%S%.f")
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn optional_timestamp_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<NaiveDateTime>> {
    match row.get::<_, Option<String>>(idx)? {
        Some(_) => parse_timestamp_column(row, idx).map(Some),
        None => Ok(None),
    }
}

/// A persisted record and its store-assigned id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredRecord {
    pub id: i64,
    #[serde(flatten)]
    pub record: ParsedRecord,
}

impl StoredRecord {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let id: i64 = row.get(0)?;
        let ip: String = row.get(1)?;
        let timestamp = parse_timestamp_column(row, 2)?;
        let status: u16 = row.get(3)?;

        // level and response are derived again from status
        let record = ParsedRecord::new(ip, timestamp, status)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e)))?;

        Ok(Self { id, record })
    }
}

/// Totals over the whole table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LogSummary {
    pub total: u64,
    pub unique_ips: u64,
    pub error_count: u64,
    pub warning_count: u64,
    pub info_count: u64,
    pub earliest: Option<NaiveDateTime>,
    pub latest: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IpCount {
    pub ip: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusCount {
    pub status: u16,
    pub count: u64,
}

/// The only component that queries `server_logs`.
///
/// Every call checks a connection out of the pool for its own duration.
/// Mutating calls run in one transaction and roll back explicitly on error.
#[derive(Clone)]
pub struct RecordStore {
    pool: ConnectionPool,
}

impl RecordStore {
    /// Wrap a pool and make sure the schema exists.
    pub fn new(pool: ConnectionPool) -> StoreResult<Self> {
        let store = Self { pool };
        store.init_schema()?;
        Ok(store)
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    fn init_schema(&self) -> StoreResult<()> {
        let conn = self.pool.acquire()?;
        conn.execute_batch(SCHEMA)?;
        debug!("Schema ready");
        Ok(())
    }

    /// Round-trip a trivial query.
    pub fn ping(&self) -> StoreResult<()> {
        let conn = self.pool.acquire()?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }

    /// Insert every record or none of them. Returns the number inserted.
    pub fn insert_batch(&self, records: &[ParsedRecord]) -> StoreResult<usize> {
        if records.is_empty() {
            warn!("No records to insert");
            return Err(StoreError::EmptyBatch);
        }

        let mut conn = self.pool.acquire()?;
        let tx = conn.transaction()?;

        match write_batch(&tx, records) {
            Ok(inserted) => {
                tx.commit()?;
                info!("Inserted {} records", inserted);
                Ok(inserted)
            }
            Err(e) => {
                error!("Insert of {} records failed: {}", records.len(), e);
                rollback(tx);
                Err(e.into())
            }
        }
    }

    /// Every stored record, newest first.
    pub fn scan_all(&self) -> StoreResult<Vec<StoredRecord>> {
        self.scan_filtered(&FilterCriteria::default())
    }

    /// Records matching every set field of `criteria`, newest first.
    pub fn scan_filtered(&self, criteria: &FilterCriteria) -> StoreResult<Vec<StoredRecord>> {
        let (clause, params) = criteria.to_sql();
        let sql = format!("{}{} ORDER BY timestamp DESC, id DESC", SELECT_SQL, clause);

        let conn = self.pool.acquire()?;
        let mut stmt = conn.prepare(&sql)?;
        let records = stmt
            .query_map(params_from_iter(params.iter()), StoredRecord::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        debug!("Scan returned {} records ({:?})", records.len(), criteria);
        Ok(records)
    }

    /// Remove every stored record. Returns the number deleted.
    pub fn delete_all(&self) -> StoreResult<usize> {
        let mut conn = self.pool.acquire()?;
        let tx = conn.transaction()?;

        match tx.execute("DELETE FROM server_logs", []) {
            Ok(deleted) => {
                tx.commit()?;
                info!("Deleted {} records", deleted);
                Ok(deleted)
            }
            Err(e) => {
                error!("Delete failed: {}", e);
                rollback(tx);
                Err(e.into())
            }
        }
    }

    /// Counts by level, distinct IPs and the covered time span.
    pub fn aggregate_stats(&self) -> StoreResult<LogSummary> {
        let conn = self.pool.acquire()?;
        let summary = conn.query_row(SUMMARY_SQL, [], |row| {
            Ok(LogSummary {
                total: row.get::<_, i64>(0)? as u64,
                unique_ips: row.get::<_, i64>(1)? as u64,
                error_count: row.get::<_, i64>(2)? as u64,
                warning_count: row.get::<_, i64>(3)? as u64,
                info_count: row.get::<_, i64>(4)? as u64,
                earliest: optional_timestamp_column(row, 5)?,
                latest: optional_timestamp_column(row, 6)?,
            })
        })?;
        Ok(summary)
    }

    /// Busiest client addresses, most requests first.
    pub fn top_ips(&self, limit: usize) -> StoreResult<Vec<IpCount>> {
        let conn = self.pool.acquire()?;
        let mut stmt = conn.prepare(
            "SELECT ip_address, COUNT(*) AS hits FROM server_logs \
             GROUP BY ip_address ORDER BY hits DESC, ip_address ASC LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit as i64], |row| {
                Ok(IpCount {
                    ip: row.get(0)?,
                    count: row.get::<_, i64>(1)? as u64,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Request count per status code, ascending by code.
    pub fn status_breakdown(&self) -> StoreResult<Vec<StatusCount>> {
        let conn = self.pool.acquire()?;
        let mut stmt = conn.prepare(
            "SELECT status, COUNT(*) FROM server_logs GROUP BY status ORDER BY status ASC",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(StatusCount {
                    status: row.get(0)?,
                    count: row.get::<_, i64>(1)? as u64,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}

fn write_batch(tx: &Transaction<'_>, records: &[ParsedRecord]) -> rusqlite::Result<usize> {
    let mut stmt = tx.prepare_cached(INSERT_SQL)?;
    let mut inserted = 0;
    for record in records {
        inserted += stmt.execute(params![
            record.ip(),
            format_timestamp(record.timestamp()),
            record.status(),
            record.level().as_str(),
            record.response_text(),
        ])?;
    }
    Ok(inserted)
}

fn rollback(tx: Transaction<'_>) {
    if let Err(e) = tx.rollback() {
        error!("Rollback failed: {}", e);
    }
}
