use std::time::Duration;

use rusqlite::ErrorCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("No database connection available after {0:?}")]
    PoolTimeout(Duration),

    #[error("Failed to open database connection: {0}")]
    Connect(#[source] rusqlite::Error),

    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Refusing to insert an empty batch")]
    EmptyBatch,
}

// Convenience type alias
pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    /// Whether retrying the same operation later may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            StoreError::PoolTimeout(_) | StoreError::Connect(_) => true,
            StoreError::Sqlite(err) => matches!(
                err.sqlite_error_code(),
                Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
            ),
            StoreError::EmptyBatch => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_timeout_is_retryable() {
        assert!(StoreError::PoolTimeout(Duration::from_millis(10)).is_retryable());
        assert!(!StoreError::EmptyBatch.is_retryable());
    }

    #[test]
    fn test_query_error_is_not_retryable() {
        let err = StoreError::from(rusqlite::Error::QueryReturnedNoRows);
        assert!(!err.is_retryable());
    }
}
