//! Result envelopes returned by every database operation
//!
//! Each envelope serializes with a `status` tag:
//!
//! ```json
//! { "status": "success", "data": [...], "row_count": 2, "message": "query succeeded" }
//! { "status": "error", "message": "SQL error: ..." }
//! ```

use serde::Serialize;
use serde_json::{Map, Value};

/// One result row: column name to value, in column order
pub type Row = Map<String, Value>;

/// Tagged outcome of a database operation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Envelope<T> {
    Success(T),
    Error { message: String },
}

impl<T> Envelope<T> {
    pub fn error(message: impl Into<String>) -> Self {
        Envelope::Error {
            message: message.into(),
        }
    }

    /// Error envelope for a failed SQL statement
    pub fn sql_error(detail: impl std::fmt::Display) -> Self {
        Self::error(format!("SQL error: {}", detail))
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Envelope::Success(_))
    }

    /// Transform the success payload with a step that may itself fail;
    /// errors pass through unchanged
    pub fn and_then<U>(self, f: impl FnOnce(T) -> Envelope<U>) -> Envelope<U> {
        match self {
            Envelope::Success(value) => f(value),
            Envelope::Error { message } => Envelope::Error { message },
        }
    }
}

/// Outcome of a single statement
///
/// Row-returning statements carry `data` with `row_count == data.len()`.
/// Other statements carry only the affected-row count.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<Row>>,
    pub row_count: u64,
    pub message: String,
}

impl QueryResult {
    pub fn rows(data: Vec<Row>) -> Self {
        Self {
            row_count: data.len() as u64,
            data: Some(data),
            message: "query succeeded".to_string(),
        }
    }

    pub fn affected(row_count: u64) -> Self {
        Self {
            data: None,
            row_count,
            message: format!("affected rows: {}", row_count),
        }
    }
}

/// Row count of a single table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowCount {
    pub table_name: String,
    pub row_count: i64,
}

/// A table name as listed from the catalog
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableRef {
    pub table_name: String,
}

/// Tables in the `public` schema
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableList {
    pub table_count: usize,
    pub tables: Vec<TableRef>,
    pub message: String,
}

impl TableList {
    pub fn new(tables: Vec<TableRef>) -> Self {
        Self {
            table_count: tables.len(),
            message: format!("found {} user tables", tables.len()),
            tables,
        }
    }
}

pub type QueryEnvelope = Envelope<QueryResult>;
pub type RowCountEnvelope = Envelope<RowCount>;
pub type TableListEnvelope = Envelope<TableList>;
