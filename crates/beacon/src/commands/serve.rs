//! Serve command - runs the HTTP server in the foreground.

use std::net::SocketAddr;

use anyhow::{Context as _, Result};
use clap::Args;

use beacon_server::{Server, ServerConfig};

use super::Context;

/// Arguments for the serve command.
///
/// CLI arguments override config file values.
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Port to listen on (overrides config)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Address to bind to (overrides config)
    #[arg(short, long)]
    pub bind: Option<String>,
}

/// Run the serve command.
pub async fn run(args: ServeArgs, ctx: &Context) -> Result<()> {
    let config = ctx.config();
    let section = config.server_or_default();

    let port = args.port.unwrap_or(section.port);
    let bind = args.bind.unwrap_or_else(|| section.bind.clone());
    let addr: SocketAddr = format!("{}:{}", bind, port)
        .parse()
        .with_context(|| format!("invalid bind address {}:{}", bind, port))?;

    if ctx.verbose {
        for source in ctx.loaded.loaded_from() {
            eprintln!("Loaded config: {}", source.display());
        }
    }

    let agent = super::build_agent(config)?;

    let server_config = ServerConfig::new()
        .with_bind_address(addr)
        .with_cors_origins(section.cors_origins.clone())
        .with_request_logging(section.request_logging)
        .with_cancel_on_disconnect(section.cancel_on_disconnect);

    println!("Beacon listening on http://{}/api/v1", addr);

    Server::new(agent, server_config)
        .run_until(addr, async {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Shutdown requested");
            }
        })
        .await?;

    Ok(())
}
