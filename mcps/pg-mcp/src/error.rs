//! Error types for database operations
//!
//! Only failures that stop an operation from producing an envelope live
//! here. Statement errors (syntax, constraint, bad parameters) are rolled
//! back and reported as error envelopes instead.

use thiserror::Error;

/// Errors that escape the database client
#[derive(Debug, Error)]
pub enum DbError {
    /// No session could be established, or the session died mid-call
    #[error("connection error: {0}")]
    Connection(#[source] tokio_postgres::Error),

    /// A driver failure that is neither a connection nor a statement error
    #[error("database error: {0}")]
    Driver(#[source] tokio_postgres::Error),
}

impl DbError {
    pub fn is_connection(&self) -> bool {
        matches!(self, DbError::Connection(_))
    }
}

/// Result type alias for database client operations
pub type DbResult<T> = Result<T, DbError>;
