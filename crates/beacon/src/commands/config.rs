//! Config command - configuration inspection.

use anyhow::Result;
use clap::{Args, Subcommand};

use super::Context;

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the merged configuration, with defaults filled in
    Show,

    /// Show which config files were checked and loaded
    Which,

    /// Show the user configuration file path
    Path,
}

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => show(ctx),
        ConfigCommand::Which => which(ctx),
        ConfigCommand::Path => path(ctx),
    }
}

fn show(ctx: &Context) -> Result<()> {
    let config = ctx.config();
    let mut resolved = config.clone();
    resolved.llm = Some(config.llm_or_default());
    resolved.agent = Some(config.agent_or_default());
    resolved.server = Some(config.server_or_default());
    resolved.storage = Some(config.storage_or_default());
    resolved.logging = Some(config.logging_or_default());

    // Never echo a key back.
    if let Some(llm) = resolved.llm.as_mut()
        && llm.api_key.is_some()
    {
        llm.api_key = Some("********".to_string());
    }

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&resolved)?);
    } else {
        print!("{}", resolved.to_toml()?);
    }
    Ok(())
}

fn which(ctx: &Context) -> Result<()> {
    if ctx.loaded.sources.is_empty() {
        println!("No config locations checked");
    }
    for source in &ctx.loaded.sources {
        let state = if source.loaded { "loaded" } else { "not found" };
        println!("{} ({})", source.path.display(), state);
    }
    Ok(())
}

fn path(ctx: &Context) -> Result<()> {
    match beacon_config::user_config_path() {
        Some(path) => {
            if ctx.json_output {
                println!("{}", serde_json::json!({ "path": path }));
            } else {
                println!("{}", path.display());
            }
            Ok(())
        }
        None => anyhow::bail!("could not determine the config directory"),
    }
}
