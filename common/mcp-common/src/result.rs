//! Result helpers for MCP tool responses
//!
//! Tool responses are text content. Structured values are rendered as pretty
//! JSON so agents can read them directly.

use rmcp::model::{CallToolResult, Content};
use serde::Serialize;

use crate::error::{internal_error, McpResult};

/// Create a successful response holding `data` as pretty-printed JSON
///
/// Fails only if `data` cannot be serialized.
pub fn json_success<T: Serialize>(data: &T) -> McpResult<CallToolResult> {
    let json = serde_json::to_string_pretty(data).map_err(|e| internal_error(e.to_string()))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

/// Create a successful plain text response
pub fn text_success(text: impl Into<String>) -> CallToolResult {
    CallToolResult::success(vec![Content::text(text.into())])
}

/// Create a failed tool response carrying a plain text explanation
///
/// The call still completes normally at the protocol level; `is_error` tells
/// the client the tool itself failed.
pub fn text_failure(text: impl Into<String>) -> CallToolResult {
    CallToolResult::error(vec![Content::text(text.into())])
}
