use std::ops::{Deref, DerefMut};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use rusqlite::{Connection, OpenFlags};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::DatabaseConfig;
use crate::error::{StoreError, StoreResult};

/// How long SQLite itself waits on a locked database file.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Where pooled connections point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionTarget {
    /// SQLite database file
    File(PathBuf),
    /// Named shared-cache in-memory database, alive while the pool is.
    ///
    /// Shared-cache table locks report `SQLITE_LOCKED` rather than busy, so
    /// statements on these connections wait for the lock holder through
    /// unlock notification instead of the busy handler.
    Memory(String),
}

impl ConnectionTarget {
    pub fn from_config(config: &DatabaseConfig) -> Self {
        if config.is_in_memory() {
            ConnectionTarget::Memory("logstore".to_string())
        } else {
            ConnectionTarget::File(PathBuf::from(&config.name))
        }
    }

    fn open(&self) -> rusqlite::Result<Connection> {
        match self {
            ConnectionTarget::File(path) => {
                let conn = Connection::open(path)?;
                conn.busy_timeout(BUSY_TIMEOUT)?;
                Ok(conn)
            }
            ConnectionTarget::Memory(name) => {
                let conn = Connection::open_with_flags(
                    format!("file:{}?mode=memory&cache=shared", name),
                    OpenFlags::SQLITE_OPEN_READ_WRITE
                        | OpenFlags::SQLITE_OPEN_CREATE
                        | OpenFlags::SQLITE_OPEN_URI
                        | OpenFlags::SQLITE_OPEN_NO_MUTEX,
                )?;
                conn.busy_timeout(BUSY_TIMEOUT)?;
                Ok(conn)
            }
        }
    }
}

/// Pool sizing.
#[derive(Debug, Clone, Copy)]
pub struct PoolOptions {
    pub max_size: usize,
    pub acquire_timeout: Duration,
}

impl PoolOptions {
    pub fn from_config(config: &DatabaseConfig) -> Self {
        Self {
            max_size: config.pool_size.max(1),
            acquire_timeout: config.acquire_timeout(),
        }
    }
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            max_size: 5,
            acquire_timeout: Duration::from_secs(5),
        }
    }
}

/// Point-in-time view of the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStatus {
    pub max_size: usize,
    /// Connections currently open, idle or handed out
    pub open: usize,
    pub idle: usize,
}

struct PoolState {
    idle: Vec<Connection>,
    open: usize,
}

struct PoolInner {
    target: ConnectionTarget,
    options: PoolOptions,
    state: Mutex<PoolState>,
    available: Condvar,
    // Keeps a shared in-memory database alive between checkouts.
    _anchor: Option<Mutex<Connection>>,
}

impl PoolInner {
    fn release(&self, conn: Connection) {
        if !conn.is_autocommit() {
            warn!("Discarding pooled connection returned inside an open transaction");
            drop(conn);
            self.forget_one();
            return;
        }

        self.state.lock().idle.push(conn);
        self.available.notify_one();
    }

    /// A checked-out connection will not come back; free its slot.
    fn forget_one(&self) {
        {
            let mut state = self.state.lock();
            state.open = state.open.saturating_sub(1);
        }
        self.available.notify_one();
    }
}

/// Bounded pool of SQLite connections.
///
/// At most `max_size` connections exist at once. `acquire` hands each one to a
/// single caller, and the returned guard puts it back when dropped, on every
/// exit path.
#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

impl ConnectionPool {
    /// Build the pool and open its first connection, so a bad target fails
    /// at startup rather than on first use.
    pub fn new(target: ConnectionTarget, options: PoolOptions) -> StoreResult<Self> {
        let anchor = match &target {
            ConnectionTarget::Memory(_) => {
                Some(Mutex::new(target.open().map_err(StoreError::Connect)?))
            }
            ConnectionTarget::File(_) => None,
        };

        let first = target.open().map_err(StoreError::Connect)?;

        info!(
            "Connection pool ready ({:?}, max_size={}, acquire_timeout={:?})",
            target, options.max_size, options.acquire_timeout
        );

        Ok(Self {
            inner: Arc::new(PoolInner {
                target,
                options: PoolOptions {
                    max_size: options.max_size.max(1),
                    ..options
                },
                state: Mutex::new(PoolState {
                    idle: vec![first],
                    open: 1,
                }),
                available: Condvar::new(),
                _anchor: anchor,
            }),
        })
    }

    pub fn from_config(config: &DatabaseConfig) -> StoreResult<Self> {
        Self::new(
            ConnectionTarget::from_config(config),
            PoolOptions::from_config(config),
        )
    }

    /// Private in-memory pool, mostly for tests and dry runs.
    pub fn in_memory(name: &str, options: PoolOptions) -> StoreResult<Self> {
        Self::new(ConnectionTarget::Memory(name.to_string()), options)
    }

    /// Check out a connection, waiting up to the acquire timeout.
    pub fn acquire(&self) -> StoreResult<PooledConnection> {
        let inner = &self.inner;
        let deadline = Instant::now() + inner.options.acquire_timeout;
        let mut state = inner.state.lock();

        loop {
            if let Some(conn) = state.idle.pop() {
                return Ok(PooledConnection::new(conn, Arc::clone(inner)));
            }

            if state.open < inner.options.max_size {
                state.open += 1;
                drop(state);

                return match inner.target.open() {
                    Ok(conn) => {
                        debug!("Opened pooled connection");
                        Ok(PooledConnection::new(conn, Arc::clone(inner)))
                    }
                    Err(e) => {
                        inner.forget_one();
                        Err(StoreError::Connect(e))
                    }
                };
            }

            let timed_out = inner.available.wait_until(&mut state, deadline).timed_out();
            if timed_out && state.idle.is_empty() && state.open >= inner.options.max_size {
                warn!(
                    "Connection pool exhausted ({} in use)",
                    inner.options.max_size
                );
                return Err(StoreError::PoolTimeout(inner.options.acquire_timeout));
            }
        }
    }

    pub fn status(&self) -> PoolStatus {
        let state = self.inner.state.lock();
        PoolStatus {
            max_size: self.inner.options.max_size,
            open: state.open,
            idle: state.idle.len(),
        }
    }

    pub fn target(&self) -> &ConnectionTarget {
        &self.inner.target
    }
}

/// A checked-out connection. Returns to the pool on drop.
pub struct PooledConnection {
    conn: Option<Connection>,
    pool: Arc<PoolInner>,
}

impl PooledConnection {
    fn new(conn: Connection, pool: Arc<PoolInner>) -> Self {
        Self {
            conn: Some(conn),
            pool,
        }
    }
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        // Only `drop` takes the connection out.
        self.conn.as_ref().expect("pooled connection used after release")
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Connection {
        self.conn.as_mut().expect("pooled connection used after release")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.release(conn);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    fn options(max_size: usize, timeout_ms: u64) -> PoolOptions {
        PoolOptions {
            max_size,
            acquire_timeout: Duration::from_millis(timeout_ms),
        }
    }

    #[test]
    fn test_new_pool_opens_one_connection() {
        let pool = ConnectionPool::in_memory("pool_new", options(3, 100)).unwrap();
        assert_eq!(
            pool.status(),
            PoolStatus {
                max_size: 3,
                open: 1,
                idle: 1
            }
        );
    }

    #[test]
    fn test_connection_is_returned_on_drop() {
        let pool = ConnectionPool::in_memory("pool_return", options(2, 100)).unwrap();
        {
            let conn = pool.acquire().unwrap();
            let one: i64 = conn.query_row("SELECT 1", [], |r| r.get(0)).unwrap();
            assert_eq!(one, 1);
            assert_eq!(pool.status().idle, 0);
        }
        assert_eq!(pool.status().idle, 1);
        assert_eq!(pool.status().open, 1);
    }

    #[test]
    fn test_pool_is_bounded() {
        let pool = ConnectionPool::in_memory("pool_bounded", options(2, 50)).unwrap();
        let _a = pool.acquire().unwrap();
        let _b = pool.acquire().unwrap();
        assert_eq!(pool.status().open, 2);

        let err = pool.acquire().err().unwrap();
        assert!(matches!(err, StoreError::PoolTimeout(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_waiter_gets_released_connection() {
        let pool = ConnectionPool::in_memory("pool_wait", options(1, 2_000)).unwrap();
        let held = pool.acquire().unwrap();

        let waiter = {
            let pool = pool.clone();
            thread::spawn(move || pool.acquire().map(|_| ()))
        };

        thread::sleep(Duration::from_millis(50));
        drop(held);
        assert!(waiter.join().unwrap().is_ok());
        assert_eq!(pool.status().open, 1);
    }

    #[test]
    fn test_connection_left_in_transaction_is_discarded() {
        let pool = ConnectionPool::in_memory("pool_tx", options(2, 100)).unwrap();
        {
            let conn = pool.acquire().unwrap();
            conn.execute_batch("BEGIN").unwrap();
        }
        assert_eq!(pool.status().open, 0);
        assert_eq!(pool.status().idle, 0);

        // the slot is usable again
        let conn = pool.acquire().unwrap();
        assert!(conn.is_autocommit());
    }

    #[test]
    fn test_memory_database_is_shared_across_connections() {
        let pool = ConnectionPool::in_memory("pool_shared", options(2, 100)).unwrap();
        let a = pool.acquire().unwrap();
        let b = pool.acquire().unwrap();
        a.execute_batch("CREATE TABLE t (x INTEGER); INSERT INTO t VALUES (7);")
            .unwrap();
        let x: i64 = b.query_row("SELECT x FROM t", [], |r| r.get(0)).unwrap();
        assert_eq!(x, 7);
    }

    #[test]
    fn test_memory_writer_waits_for_open_transaction() {
        let pool = ConnectionPool::in_memory("pool_locked", options(2, 2_000)).unwrap();
        let a = pool.acquire().unwrap();
        a.execute_batch("CREATE TABLE t (x INTEGER); BEGIN; INSERT INTO t VALUES (1);")
            .unwrap();

        let writer = {
            let pool = pool.clone();
            thread::spawn(move || {
                let b = pool.acquire().unwrap();
                b.execute("INSERT INTO t VALUES (2)", []).map(|_| ())
            })
        };

        thread::sleep(Duration::from_millis(100));
        a.execute_batch("COMMIT").unwrap();

        assert!(writer.join().unwrap().is_ok());
        let count: i64 = a.query_row("SELECT COUNT(*) FROM t", [], |r| r.get(0)).unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_concurrent_checkouts_never_exceed_max() {
        let pool = ConnectionPool::in_memory("pool_concurrent", options(3, 5_000)).unwrap();
        let in_use = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..12)
            .map(|_| {
                let pool = pool.clone();
                let in_use = Arc::clone(&in_use);
                let peak = Arc::clone(&peak);
                thread::spawn(move || {
                    for _ in 0..10 {
                        let conn = pool.acquire().unwrap();
                        let now = in_use.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        let _: i64 = conn.query_row("SELECT 1", [], |r| r.get(0)).unwrap();
                        in_use.fetch_sub(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 3);
        let status = pool.status();
        assert!(status.open <= 3);
        assert_eq!(status.open, status.idle);
    }

    #[test]
    fn test_bad_file_target_fails_at_startup() {
        let target = ConnectionTarget::File(PathBuf::from("/nonexistent-dir/sub/db.sqlite"));
        let err = ConnectionPool::new(target, PoolOptions::default()).err().unwrap();
        assert!(matches!(err, StoreError::Connect(_)));
    }
}
