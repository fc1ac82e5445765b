//! In-process tool execution
//!
//! [`EmbeddableMcp`] lets a host (or a test) call a server's tools by name
//! without standing up a transport.
//!
//! ```rust,ignore
//! use mcp_common::EmbeddableMcp;
//!
//! let tools = server.list_tools();
//! let result = server
//!     .call_tool("pg_execute_query", serde_json::json!({ "sql": "SELECT 1" }))
//!     .await?;
//! ```

use async_trait::async_trait;
use rmcp::model::{CallToolResult, Tool};
use serde_json::Value;

/// Error type for embeddable MCP operations
#[derive(Debug, thiserror::Error)]
pub enum EmbeddableError {
    #[error("tool not found: {0}")]
    ToolNotFound(String),

    /// Arguments did not deserialize into the tool's parameter type
    #[error("invalid parameters: {0}")]
    InvalidParams(#[from] serde_json::Error),

    /// The tool returned a protocol-level error
    #[error("mcp error: {0}")]
    McpError(String),
}

impl From<rmcp::ErrorData> for EmbeddableError {
    fn from(err: rmcp::ErrorData) -> Self {
        EmbeddableError::McpError(err.message.to_string())
    }
}

/// Result type for embeddable MCP operations
pub type EmbeddableResult<T> = Result<T, EmbeddableError>;

/// An MCP server whose tools can be invoked directly in-process
///
/// Implementations are `Send + Sync` so concurrent tasks can share one
/// server. Servers built on `#[tool_router]` list tools through their router
/// and dispatch `call_tool` by matching on the tool name.
#[async_trait]
pub trait EmbeddableMcp: Send + Sync {
    /// Server name, as used in MCP client configuration
    fn server_name(&self) -> &str;

    /// All tools with their names, descriptions, and input schemas
    fn list_tools(&self) -> Vec<Tool>;

    /// Run a tool by name with a JSON object of parameters
    async fn call_tool(&self, name: &str, params: Value) -> EmbeddableResult<CallToolResult>;

    fn server_description(&self) -> Option<&str> {
        None
    }
}
