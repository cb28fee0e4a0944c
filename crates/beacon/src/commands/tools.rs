//! Tools command - lists the built-in tools and where they may be called.

use anyhow::Result;
use clap::Args;
use console::Style;

use beacon_agent::builtin_registry;
use beacon_types::CallSite;

use super::Context;

/// Arguments for the tools command.
#[derive(Args, Debug)]
pub struct ToolsArgs {
    /// Print each tool's parameter schema
    #[arg(short, long)]
    pub schema: bool,
}

/// Run the tools command.
pub async fn run(args: ToolsArgs, ctx: &Context) -> Result<()> {
    let definitions = builtin_registry().definitions();

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&definitions)?);
        return Ok(());
    }

    let bold = Style::new().bold();
    let dim = Style::new().dim();

    for def in &definitions {
        let callers: Vec<&str> = def
            .allowed_callers
            .iter()
            .map(|site| match site {
                CallSite::Direct => "direct",
                CallSite::Program => "program",
            })
            .collect();

        println!(
            "{} {}",
            bold.apply_to(&def.name),
            dim.apply_to(format!("[{}]", callers.join(", ")))
        );
        println!("  {}", def.description);
        if args.schema {
            for line in serde_json::to_string_pretty(&def.parameter_schema)?.lines() {
                println!("  {}", dim.apply_to(line));
            }
        }
    }

    Ok(())
}
