//! Beacon - programmatic tool-calling agent for operations data
//!
//! Main entry point for the Beacon CLI.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_appender::non_blocking::WorkerGuard;

mod commands;

use commands::{ask, config, serve, tools};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// Beacon - programmatic tool-calling agent for operations data
#[derive(Parser)]
#[command(name = "beacon")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// Path to config file (overrides default discovery)
    #[arg(long, global = true, env = "BEACON_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server
    Serve(serve::ServeArgs),

    /// Ask a one-shot question
    Ask(ask::AskArgs),

    /// List the registered tools
    Tools(tools::ToolsArgs),

    /// Configuration management
    Config(config::ConfigArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = commands::load_config(cli.config.as_deref())?;
    let _guard = init_tracing(&loaded.config.logging_or_default(), cli.verbose);

    for warning in &loaded.warnings {
        tracing::warn!("{}", warning);
    }

    let ctx = commands::Context {
        loaded,
        json_output: cli.json,
        verbose: cli.verbose,
    };

    match cli.command {
        Commands::Serve(args) => serve::run(args, &ctx).await,
        Commands::Ask(args) => ask::run(args, &ctx).await,
        Commands::Tools(args) => tools::run(args, &ctx).await,
        Commands::Config(args) => config::run(args, &ctx).await,
    }
}

/// Console output (human-readable, stderr) plus a daily rolling JSON file.
///
/// `RUST_LOG` wins over `-v`, which wins over `logging.level`.
fn init_tracing(logging: &beacon_config::LoggingConfig, verbose: bool) -> Option<WorkerGuard> {
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::{EnvFilter, fmt};

    let console_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new(
                "beacon=debug,beacon_agent=debug,beacon_llm=debug,beacon_server=debug,beacon_session=debug,beacon_config=debug,info",
            )
        } else {
            EnvFilter::new(format!(
                "beacon={lvl},beacon_agent={lvl},beacon_llm={lvl},beacon_server={lvl},beacon_session={lvl},warn",
                lvl = logging.level
            ))
        }
    });

    let console = fmt::layer()
        .with_target(true)
        .with_writer(std::io::stderr)
        .with_filter(console_filter);

    let log_dir = logging
        .dir
        .clone()
        .or_else(|| beacon_config::config_dir().map(|d| d.join("logs")));

    match log_dir.filter(|_| logging.file) {
        Some(dir) => {
            let file_appender = tracing_appender::rolling::daily(&dir, "beacon.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            tracing_subscriber::registry()
                .with(console)
                .with(
                    fmt::layer().json().with_writer(non_blocking).with_filter(EnvFilter::new(
                        "beacon=trace,beacon_agent=trace,beacon_llm=trace,beacon_server=trace,beacon_session=trace,beacon_config=trace,info",
                    )),
                )
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry().with(console).init();
            None
        }
    }
}
