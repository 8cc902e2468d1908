//! `altary-mcp`: the Altary MCP server on stdio.
//!
//! Logs go to stderr; set `RUST_LOG` to change the level (default `info`).
//! `ALTARY_CONFIG_PATH` and `ALTARY_API_BASE_URL` override the config file
//! location and the service URL.

use std::sync::Arc;

use altary_auth::AuthFlow;
use altary_client::RemoteClient;
use altary_mcp::{McpServer, Router};
use altary_session::SessionStore;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // stdout carries the protocol.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let store = Arc::new(SessionStore::from_env());
    tracing::info!(config = %store.path().display(), "starting altary-mcp");

    let client = RemoteClient::new(store);
    let auth = AuthFlow::new(client.clone());
    let router = Router::new(client, auth);

    McpServer::new(router).serve_stdio().await?;
    Ok(())
}
