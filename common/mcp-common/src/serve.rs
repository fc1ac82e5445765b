//! Transport setup for MCP servers
//!
//! Two ways to expose a server:
//!
//! - [`serve_stdio`] for clients that spawn the binary and speak over pipes
//! - [`serve_http`] for the streamable HTTP transport (SSE event streams per
//!   session), mounted under a path of an axum router

use anyhow::Context;
use rmcp::{
    transport::streamable_http_server::{
        session::local::LocalSessionManager, StreamableHttpServerConfig, StreamableHttpService,
    },
    ServerHandler, ServiceExt,
};

/// Serve over stdin/stdout until the client disconnects
pub async fn serve_stdio<S>(server: S) -> anyhow::Result<()>
where
    S: ServerHandler,
{
    let service = server.serve(rmcp::transport::stdio()).await?;

    tracing::info!("Server running on stdio, waiting for requests...");

    service.waiting().await?;
    Ok(())
}

/// Serve over streamable HTTP until Ctrl-C
///
/// `factory` is called once per MCP session. Servers that share state across
/// sessions should hand out clones that point at the same shared resources.
///
/// # Example
///
/// ```rust,ignore
/// let server = MyServer::new(shared);
/// serve_http(move || Ok(server.clone()), "0.0.0.0:8000", "/mcp").await?;
/// ```
pub async fn serve_http<S, F>(factory: F, bind_addr: &str, path: &str) -> anyhow::Result<()>
where
    S: ServerHandler,
    F: Fn() -> Result<S, std::io::Error> + Send + Sync + 'static,
{
    let service = StreamableHttpService::new(
        factory,
        LocalSessionManager::default().into(),
        StreamableHttpServerConfig::default(),
    );

    // axum refuses to nest at the root
    let router = if path == "/" || path.is_empty() {
        axum::Router::new().fallback_service(service)
    } else {
        axum::Router::new().nest_service(path, service)
    };

    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;

    tracing::info!(addr = %listener.local_addr()?, path, "Streamable HTTP transport listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
