//! Store error types

use thiserror::Error;

/// Errors from the SQLite store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Connection mutex poisoned
    #[error("Lock error: {0}")]
    Lock(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0} already exists")]
    Conflict(String),

    /// Request rejected before touching the database
    #[error("Invalid input: {0}")]
    Invalid(String),

    /// Stored value could not be decoded
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StoreError::NotFound("patient P001".to_string());
        assert_eq!(err.to_string(), "patient P001 not found");

        let err = StoreError::Conflict("patient P001".to_string());
        assert_eq!(err.to_string(), "patient P001 already exists");
    }

    #[test]
    fn test_sqlite_error_conversion() {
        let err: StoreError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(err, StoreError::Sqlite(_)));
    }
}
