//! Purelymail MCP Server
//!
//! Run with: purelymail-mcp (stdio) or MCP_TRANSPORT=http purelymail-mcp

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use purelymail_mcp::config::{Cli, LogFormat, ServerConfig, Transport};
use purelymail_mcp::error::{GatewayError, Result};
use purelymail_mcp::integrations::PurelymailClient;
use purelymail_mcp::mcp::{purelymail_registry, Correlator, Dispatcher, McpHandler};
use purelymail_mcp::transport::{HttpServer, StdioServer};

fn init_tracing(format: LogFormat) {
    // Logs go to stderr; stdout carries the stdio protocol
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(false),
            )
            .init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init(),
    }
}

async fn run(config: ServerConfig) -> Result<()> {
    let client = Arc::new(PurelymailClient::new(config.upstream.clone())?);
    let registry = Arc::new(purelymail_registry(client)?);
    if registry.is_empty() {
        return Err(GatewayError::Config("no tools registered".to_string()));
    }
    tracing::info!("Loaded {} Purelymail tools", registry.len());

    let handler: Arc<dyn McpHandler> = Arc::new(Dispatcher::new(registry));

    match config.transport {
        Transport::Stdio => {
            tracing::info!("Purelymail MCP server starting on stdio...");
            StdioServer::new(handler).run().await?;
        }
        Transport::Http => {
            let correlator = Correlator::connect(handler, config.request_timeout);
            tracing::info!(
                "Purelymail MCP server starting on http://{}/mcp",
                config.listen_addr
            );
            HttpServer::new(correlator, config.listen_addr).start().await?;
        }
    }

    tracing::info!("Purelymail MCP server stopped");
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let config = match cli.into_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("purelymail-mcp: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run(config).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
