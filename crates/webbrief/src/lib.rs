//! `webbrief` crate (library surface).
//!
//! The primary entrypoint is the `webbrief` binary (authenticated MCP over HTTP). The library
//! exposes the configuration and router so the server can be embedded or exercised in tests.

pub mod config;
pub mod mcp;

pub use config::AppConfig;
pub use webbrief_core as core;

use std::sync::Arc;

/// Bind `config.listen` and serve until Ctrl-C.
pub async fn serve(config: AppConfig) -> anyhow::Result<()> {
    let listen = config.listen;
    let app = mcp::router(Arc::new(config))?;
    let listener = tokio::net::TcpListener::bind(listen).await?;
    tracing::info!(addr = %listener.local_addr()?, "serving MCP over HTTP at /mcp");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
        })
        .await?;
    tracing::info!("server stopped");
    Ok(())
}
