//! Parameter definitions for pg-mcp tools

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Parameters for pg_execute_query
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExecuteQueryParams {
    /// SQL statement, with `$1`, `$2`, ... placeholders for parameters
    /// (e.g. "SELECT * FROM users WHERE id = $1")
    pub sql: String,

    /// Positional parameter values, in placeholder order (e.g. [1])
    #[serde(default)]
    pub params: Option<Vec<Value>>,
}

/// Parameters for tools that operate on one table
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TableParams {
    /// Table name in the public schema (e.g. "users")
    pub table_name: String,
}
