//! MCP Common - Shared plumbing for MCP servers
//!
//! - **Logging**: [`init_tracing`] with console and rolling-file output
//! - **Transports**: [`serve_stdio`] and [`serve_http`] (streamable HTTP)
//! - **Results**: helpers for building `CallToolResult` responses
//! - **Embeddable**: [`EmbeddableMcp`] for calling tools in-process
//!
//! # Example
//!
//! ```rust,ignore
//! let _guard = mcp_common::init_tracing("my_mcp", LogOptions::default())?;
//! let server = MyServer::new();
//! mcp_common::serve_http(move || Ok(server.clone()), "127.0.0.1:8000", "/mcp").await?;
//! ```

pub mod embeddable;
pub mod error;
pub mod init;
pub mod result;
pub mod serve;

// Re-export commonly used items at crate root
pub use embeddable::{EmbeddableError, EmbeddableMcp, EmbeddableResult};
pub use error::{internal_error, McpResult};
pub use init::{init_tracing, ConsoleTarget, LogOptions, LOG_FILE_NAME};
pub use result::{json_success, text_failure, text_success};
pub use serve::{serve_http, serve_stdio};

// Re-export rmcp types that are commonly needed
pub use rmcp::{
    model::{CallToolResult, Content, Tool},
    ErrorData as McpError,
};

// Re-export async_trait for implementing EmbeddableMcp
pub use async_trait::async_trait;
