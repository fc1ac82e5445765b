//! Error helpers for MCP servers

use rmcp::ErrorData as McpError;

/// Type alias for MCP tool results
pub type McpResult<T> = Result<T, McpError>;

/// Create an internal error with a message
pub fn internal_error(message: impl Into<String>) -> McpError {
    McpError::internal_error(message.into(), None)
}
