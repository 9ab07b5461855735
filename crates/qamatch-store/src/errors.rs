//! Error types for the record store.
//!
//! Every variant means the store could not serve the request; callers above
//! this crate treat them uniformly as "store unavailable".

use thiserror::Error;

/// Errors that can occur during record store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// `SQLite` database error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Connection pool error (could not open or acquire a connection).
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// Schema migration failed.
    #[error("migration error: {message}")]
    Migration {
        /// Describes which migration failed and why.
        message: String,
    },

    /// Filesystem error while preparing the database location.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Requested record was not found.
    #[error("record not found: {0}")]
    RecordNotFound(i64),
}

/// Convenience type alias for store results.
pub type Result<T> = std::result::Result<T, StoreError>;
