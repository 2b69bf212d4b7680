//! Chat command - interactive REPL mode.

use anyhow::Result;
use clap::Args;

use super::Context;
use super::repl::Repl;

/// Arguments for the chat command.
#[derive(Args, Debug)]
pub struct ChatArgs {
    /// Resume an existing conversation
    #[arg(short, long)]
    pub conversation: Option<String>,
}

/// Run the chat command.
pub async fn run(args: ChatArgs, ctx: &Context) -> Result<()> {
    let assistant = ctx.assistant()?;
    let history = ctx.data_dir.join("chat_history.txt");
    let mut repl = Repl::new(assistant, args.conversation, history, ctx.verbose)?;
    repl.run().await
}
