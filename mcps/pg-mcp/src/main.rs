//! PostgreSQL MCP Server
//!
//! Runs SQL statements and inspects tables of a PostgreSQL database on behalf
//! of an MCP client.
//!
//! # Usage
//!
//! Serve over streamable HTTP (default, on `mcp_host:mcp_port` + `mcp_path`):
//! `pg-mcp`
//!
//! Or let the client spawn it over stdio:
//! ```json
//! { "mcpServers": { "postgres": { "command": "./pg-mcp", "args": ["--transport", "stdio"] } } }
//! ```
//!
//! Connection settings come from `pg_*` environment variables or a `.env`
//! file.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use mcp_common::{ConsoleTarget, LogOptions};
use pg_mcp::{PgClient, PgConfig, PgMcpServer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Transport {
    /// Streamable HTTP with SSE event streams
    Http,
    /// stdin/stdout, for clients that spawn the server
    Stdio,
}

#[derive(Debug, Parser)]
#[command(name = "pg-mcp", version, about = "PostgreSQL tools over MCP")]
struct Cli {
    /// Transport to serve MCP over
    #[arg(long, env = "MCP_TRANSPORT", value_enum, default_value_t = Transport::Http)]
    transport: Transport,

    /// Environment file to load settings from
    #[arg(long, default_value = ".env")]
    env_file: PathBuf,

    /// Directory for the rolling log file (overrides log_dir)
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = PgConfig::load(&cli.env_file).context("Invalid configuration")?;

    let console = match cli.transport {
        Transport::Http => ConsoleTarget::Stdout,
        Transport::Stdio => ConsoleTarget::Stderr,
    };
    let log_dir = cli.log_dir.unwrap_or_else(|| config.log_dir.clone());
    let _log_guard =
        mcp_common::init_tracing("pg_mcp", LogOptions::console(console).with_log_dir(log_dir))?;

    let endpoint = match cli.transport {
        Transport::Http => format!("{}{}", config.bind_addr(), config.mcp_path),
        Transport::Stdio => "stdio".to_string(),
    };
    tracing::info!("{}", "=".repeat(50));
    tracing::info!("PostgreSQL MCP server starting");
    tracing::info!("Server: {}", endpoint);
    tracing::info!("Database: {}@{}:{}/{}", config.pg_user, config.pg_host, config.pg_port, config.pg_db);
    tracing::info!("{}", "=".repeat(50));

    let client = Arc::new(PgClient::new(config.clone()));
    let server = PgMcpServer::new(Arc::clone(&client));

    let served = match cli.transport {
        Transport::Http => {
            mcp_common::serve_http(move || Ok(server.clone()), &config.bind_addr(), &config.mcp_path)
                .await
        }
        Transport::Stdio => mcp_common::serve_stdio(server).await,
    };

    client.close().await;
    tracing::info!("Server shutting down");

    served
}
