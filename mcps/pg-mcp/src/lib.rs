//! PostgreSQL MCP Library
//!
//! Exposes PostgreSQL statement execution and catalog lookups as MCP tools:
//! `pg_execute_query`, `pg_get_table_schema`, `pg_get_table_row_count`, and
//! `pg_list_tables`.
//!
//! # Usage as Library
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use pg_mcp::{PgClient, PgConfig, PgMcpServer};
//!
//! let client = Arc::new(PgClient::new(PgConfig::from_env()?));
//! let server = PgMcpServer::new(client);
//! // Serve over HTTP or stdio, or call tools in-process via EmbeddableMcp
//! ```

pub mod client;
pub mod config;
pub mod convert;
pub mod envelope;
pub mod error;
pub mod handlers;
pub mod params;
pub mod server;

// Re-export main types
pub use client::PgClient;
pub use config::{ConfigError, PgConfig};
pub use envelope::{Envelope, QueryResult, Row, RowCount, TableList, TableRef};
pub use error::{DbError, DbResult};
pub use server::PgMcpServer;

// Re-export parameter types for direct API usage
pub use params::{ExecuteQueryParams, TableParams};
