//! MCP Server implementation for PostgreSQL
//!
//! Tools are thin adapters: each one delegates to a handler in the
//! handlers module, which forwards to the shared [`PgClient`].

use std::sync::Arc;

use mcp_common::{async_trait, EmbeddableError, EmbeddableMcp, EmbeddableResult, McpError};
use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, ServerCapabilities, ServerInfo, Tool},
    tool, tool_handler, tool_router,
};
use serde_json::Value;

use crate::client::PgClient;
use crate::handlers;
use crate::params::{ExecuteQueryParams, TableParams};

/// Name the server registers under
pub const SERVER_NAME: &str = "postgresql-mcp-server";

/// The PostgreSQL MCP Server
///
/// Clones share the same database client, so the HTTP transport can hand
/// each session its own server value.
#[derive(Clone)]
pub struct PgMcpServer {
    client: Arc<PgClient>,
    tool_router: ToolRouter<Self>,
}

// ============================================================================
// Tool Router - Each tool delegates to its handler
// ============================================================================

#[tool_router]
impl PgMcpServer {
    pub fn new(client: Arc<PgClient>) -> Self {
        Self {
            client,
            tool_router: Self::tool_router(),
        }
    }

    #[tool(description = "Execute a PostgreSQL statement (SELECT/INSERT/UPDATE/DELETE/DDL). \
        Use $1, $2, ... placeholders with the params list, e.g. sql: \"SELECT * FROM users WHERE id = $1\", params: [1]. \
        Row-returning statements report data and row_count; other statements report the affected row count. \
        Every statement is committed on success and rolled back on error.")]
    async fn pg_execute_query(
        &self,
        Parameters(params): Parameters<ExecuteQueryParams>,
    ) -> Result<CallToolResult, McpError> {
        handlers::execute_query(&self.client, params).await
    }

    #[tool(description = "Get the column definitions of a table in the public schema: \
        column_name, data_type, character_maximum_length, is_nullable, column_default, in column order.")]
    async fn pg_get_table_schema(
        &self,
        Parameters(params): Parameters<TableParams>,
    ) -> Result<CallToolResult, McpError> {
        handlers::get_table_schema(&self.client, params).await
    }

    #[tool(description = "Count the rows of a table in the public schema (e.g. table_name: \"users\"). \
        The name is matched exactly first, then in lower case, the way unquoted identifiers fold.")]
    async fn pg_get_table_row_count(
        &self,
        Parameters(params): Parameters<TableParams>,
    ) -> Result<CallToolResult, McpError> {
        handlers::get_table_row_count(&self.client, params).await
    }

    #[tool(description = "List all user tables in the public schema, ordered by name.")]
    async fn pg_list_tables(&self) -> Result<CallToolResult, McpError> {
        handlers::list_tables(&self.client).await
    }
}

#[tool_handler]
impl rmcp::ServerHandler for PgMcpServer {
    fn get_info(&self) -> ServerInfo {
        let config = self.client.config();
        ServerInfo {
            instructions: Some(format!(
                "PostgreSQL MCP server for database '{}' on {}:{}. \
                Use pg_list_tables to discover tables, pg_get_table_schema to inspect columns, \
                pg_get_table_row_count to count rows, and pg_execute_query to run SQL.",
                config.pg_db, config.pg_host, config.pg_port
            )),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

// ============================================================================
// In-process execution
// ============================================================================

#[async_trait]
impl EmbeddableMcp for PgMcpServer {
    fn server_name(&self) -> &str {
        SERVER_NAME
    }

    fn server_description(&self) -> Option<&str> {
        Some(
            "PostgreSQL MCP Server - runs SQL statements and inspects tables \
             of the public schema.",
        )
    }

    fn list_tools(&self) -> Vec<Tool> {
        self.tool_router.list_all()
    }

    async fn call_tool(&self, name: &str, params: Value) -> EmbeddableResult<CallToolResult> {
        match name {
            "pg_execute_query" => {
                let params: ExecuteQueryParams = serde_json::from_value(params)?;
                self.pg_execute_query(Parameters(params))
                    .await
                    .map_err(Into::into)
            }

            "pg_get_table_schema" => {
                let params: TableParams = serde_json::from_value(params)?;
                self.pg_get_table_schema(Parameters(params))
                    .await
                    .map_err(Into::into)
            }

            "pg_get_table_row_count" => {
                let params: TableParams = serde_json::from_value(params)?;
                self.pg_get_table_row_count(Parameters(params))
                    .await
                    .map_err(Into::into)
            }

            "pg_list_tables" => self.pg_list_tables().await.map_err(Into::into),

            _ => Err(EmbeddableError::ToolNotFound(name.to_string())),
        }
    }
}
