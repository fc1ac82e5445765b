//! Handler implementations for pg-mcp tools
//!
//! Each handler calls the database client and renders the resulting envelope
//! as JSON text. Errors that escaped the client become a textual failure
//! result, so every call gets an answer.

use mcp_common::{json_success, text_failure, CallToolResult, McpResult};
use serde::Serialize;

use crate::client::PgClient;
use crate::envelope::Envelope;
use crate::error::DbResult;
use crate::params::{ExecuteQueryParams, TableParams};

fn respond<T: Serialize>(operation: &str, outcome: DbResult<Envelope<T>>) -> McpResult<CallToolResult> {
    match outcome {
        Ok(envelope) => json_success(&envelope),
        Err(e) => {
            tracing::error!("{} failed: {}", operation, e);
            Ok(text_failure(format!("{} failed: {}", operation, e)))
        }
    }
}

pub async fn execute_query(
    client: &PgClient,
    params: ExecuteQueryParams,
) -> McpResult<CallToolResult> {
    let values = params.params.unwrap_or_default();
    respond("query", client.execute(&params.sql, &values).await)
}

pub async fn get_table_schema(client: &PgClient, params: TableParams) -> McpResult<CallToolResult> {
    respond(
        "schema lookup",
        client.get_table_schema(&params.table_name).await,
    )
}

pub async fn get_table_row_count(
    client: &PgClient,
    params: TableParams,
) -> McpResult<CallToolResult> {
    respond("row count", client.get_row_count(&params.table_name).await)
}

pub async fn list_tables(client: &PgClient) -> McpResult<CallToolResult> {
    respond("table listing", client.list_tables().await)
}
