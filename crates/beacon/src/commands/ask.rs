//! Ask command - one-shot question answered in-process.

use std::io::Write;

use anyhow::Result;
use clap::Args;
use console::Style;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use beacon_agent::StreamEvent;
use beacon_session::ConversationStore;
use beacon_types::{ConversationId, ToolStatus};

use super::Context;

/// Arguments for the ask command.
#[derive(Args, Debug)]
pub struct AskArgs {
    /// The question or prompt to send
    #[arg(required = true)]
    pub prompt: String,

    /// Continue an existing conversation (needs a persistent store)
    #[arg(short, long)]
    pub conversation: Option<String>,

    /// Print generated programs as they run
    #[arg(long)]
    pub show_code: bool,
}

/// Run the ask command.
pub async fn run(args: AskArgs, ctx: &Context) -> Result<()> {
    let agent = super::build_agent(ctx.config())?;
    let store = agent.store();

    let conversation_id = match args.conversation {
        Some(id) => ConversationId::from_string(id),
        None => store.create_conversation(None).await?.id,
    };

    let dim = Style::new().dim();
    if ctx.verbose && !ctx.json_output {
        println!("{}", dim.apply_to(format!("Conversation: {}", conversation_id)));
    }

    // Ctrl-C cancels the turn; the agent still ends the stream with an
    // error event.
    let cancellation = CancellationToken::new();
    let on_interrupt = cancellation.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let mut events = agent.turn_stream(conversation_id, args.prompt, cancellation);
    let mut failure = None;

    while let Some(event) = events.next().await {
        if ctx.json_output {
            println!("{}", serde_json::to_string(&event)?);
        } else {
            print_event(&event, args.show_code)?;
        }
        if let StreamEvent::Error { error, .. } = &event {
            failure = Some(error.clone());
        }
    }

    match failure {
        Some(error) => Err(anyhow::anyhow!(error)),
        None => Ok(()),
    }
}

fn print_event(event: &StreamEvent, show_code: bool) -> Result<()> {
    let dim = Style::new().dim();

    match event {
        StreamEvent::Thinking { content } => {
            println!("{}", dim.apply_to(content));
        }
        StreamEvent::CodeExecution { code } => {
            println!("{}", dim.apply_to("[Running program]"));
            if show_code {
                for line in code.lines() {
                    println!("{}", dim.apply_to(format!("  | {}", line)));
                }
            }
        }
        StreamEvent::ToolCall { tool_name, .. } => {
            println!("{}", dim.apply_to(format!("[Calling: {}]", tool_name)));
        }
        StreamEvent::ToolResult {
            tool_name,
            status,
            error,
            ..
        } => {
            let label = match status {
                ToolStatus::Completed => "done".to_string(),
                ToolStatus::Error => format!(
                    "failed: {}",
                    error.as_deref().unwrap_or("unknown error")
                ),
            };
            println!("{}", dim.apply_to(format!("[{} {}]", tool_name, label)));
        }
        StreamEvent::Response { content, .. } => {
            println!();
            println!("{}", content);
        }
        StreamEvent::Error { content, error } => {
            let red = Style::new().red();
            eprintln!();
            eprintln!("{} {} ({})", red.apply_to("Error:"), content, error);
        }
    }

    std::io::stdout().flush()?;
    Ok(())
}
