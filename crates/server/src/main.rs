//! toolshell server entry point.
//!
//! Boots the cache agent and a headless shell session over the configured
//! origin, then serves them as MCP tools on stdio.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use toolshell_client::{
    AgentConfig, CacheAgent, FetchClient, FetchConfig, HeadlessPage, Navigator, NavigatorConfig,
};
use toolshell_core::{AppConfig, CacheDb};
use tracing_subscriber::EnvFilter;

mod error;
mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    tracing::info!(origin = %config.origin, generation = %config.generation, "starting toolshell on stdio transport");

    let store = CacheDb::open(&config.db_path).await?;
    let network = Arc::new(FetchClient::new(FetchConfig::from_app(&config))?);
    let agent = Arc::new(CacheAgent::new(store, network, AgentConfig::from_app(&config)?));

    let host = Arc::new(HeadlessPage::new());
    let shell = Navigator::new(host, agent.clone(), NavigatorConfig::from_app(&config)?)?
        .on_reinit(|| tracing::debug!("page behaviors re-initialized"));

    let handler = handler::ToolshellServer::new(agent.clone(), Arc::new(shell));
    let server = serve_server(handler, stdio()).await?;
    server.waiting().await?;

    agent.flush().await;
    Ok(())
}
