//! Conversations command - browse stored transcripts.

use anyhow::{Result, bail};
use clap::{Args, Subcommand};
use console::{Style, style};

use mneme_memory::ChatRole;

use super::{Context, truncate};

/// Arguments for the conversations command.
#[derive(Args, Debug)]
pub struct ConversationsArgs {
    #[command(subcommand)]
    pub command: ConversationsCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConversationsCommand {
    /// List recent conversations
    List {
        /// Number of conversations to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Show a full transcript
    Show {
        /// Conversation id
        id: String,
    },
}

/// Run the conversations command.
pub async fn run(args: ConversationsArgs, ctx: &Context) -> Result<()> {
    let store = ctx.open_conversations()?;
    let dim = Style::new().dim();

    match args.command {
        ConversationsCommand::List { limit } => {
            let conversations = store.list(limit)?;
            if ctx.json_output {
                println!("{}", serde_json::to_string_pretty(&conversations)?);
                return Ok(());
            }
            if conversations.is_empty() {
                println!("{}", dim.apply_to("No conversations yet"));
                return Ok(());
            }
            for conversation in &conversations {
                println!(
                    "{}  {}  {}",
                    dim.apply_to(conversation.updated_at.format("%Y-%m-%d %H:%M")),
                    style(&conversation.id).cyan(),
                    truncate(&conversation.title, 50)
                );
            }
        }
        ConversationsCommand::Show { id } => {
            let Some(conversation) = store.get(&id)? else {
                bail!("conversation not found: {id}");
            };
            if ctx.json_output {
                println!("{}", serde_json::to_string_pretty(&conversation)?);
                return Ok(());
            }
            println!("{}", style(&conversation.title).bold());
            println!(
                "{}",
                dim.apply_to(format!(
                    "{} · started {}",
                    conversation.id,
                    conversation.created_at.format("%Y-%m-%d %H:%M")
                ))
            );
            println!("{}", dim.apply_to("─".repeat(50)));
            for message in &conversation.messages {
                let label = match message.role {
                    ChatRole::User => style("you").cyan().bold(),
                    ChatRole::Assistant => style("mneme").green().bold(),
                    ChatRole::System => style("system").yellow().bold(),
                };
                println!("{label}: {}", message.content);
                println!();
            }
        }
    }
    Ok(())
}
