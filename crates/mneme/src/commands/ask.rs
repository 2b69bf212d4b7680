//! Ask command - one-shot question with memory.

use anyhow::Result;
use clap::Args;
use console::Style;
use serde_json::json;

use super::{Context, truncate};

/// Arguments for the ask command.
#[derive(Args, Debug)]
pub struct AskArgs {
    /// The question or prompt to send
    #[arg(required = true, num_args = 1..)]
    pub prompt: Vec<String>,

    /// Continue an existing conversation
    #[arg(short, long)]
    pub conversation: Option<String>,
}

/// Run the ask command.
pub async fn run(args: AskArgs, ctx: &Context) -> Result<()> {
    let assistant = ctx.assistant()?;
    let prompt = args.prompt.join(" ");
    let dim = Style::new().dim();

    let outcome = assistant
        .handle_turn(args.conversation.as_deref(), &prompt)
        .await?;

    if ctx.json_output {
        let value = json!({
            "conversation_id": outcome.conversation_id,
            "response": outcome.response,
            "memories_used": outcome.memories_used,
            "episodic_id": outcome.update.episodic_id,
            "facts_stored": outcome.update.facts_stored,
            "concepts": outcome.concepts,
            "errors": outcome.update.errors,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("{}", outcome.response);

    if ctx.verbose {
        println!();
        println!(
            "{}",
            dim.apply_to(format!("Conversation: {}", outcome.conversation_id))
        );
        for memory in &outcome.memories_used {
            println!(
                "{}",
                dim.apply_to(format!("  used {} {}", memory.id, truncate(memory.display_text(), 60)))
            );
        }
        println!("{}", dim.apply_to(outcome.update.to_string()));
    }

    Ok(())
}
