//! REPL (Read-Eval-Print Loop) implementation for interactive chat.

use anyhow::Result;
use console::{Style, Term, style};
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{Config, Editor};
use std::path::PathBuf;
use tracing::debug;

use mneme_agent::Assistant;
use mneme_memory::MemoryRecord;

use super::truncate;

/// REPL state and configuration.
pub struct Repl {
    assistant: Assistant,
    conversation_id: Option<String>,
    last_memories: Vec<MemoryRecord>,
    editor: Editor<(), DefaultHistory>,
    history_path: PathBuf,
    term: Term,
    verbose: bool,
}

impl Repl {
    pub fn new(
        assistant: Assistant,
        conversation_id: Option<String>,
        history_path: PathBuf,
        verbose: bool,
    ) -> Result<Self> {
        let config = Config::builder()
            .history_ignore_space(true)
            .auto_add_history(true)
            .build();

        let mut editor = Editor::with_config(config)?;
        if let Err(e) = editor.load_history(&history_path) {
            debug!(path = %history_path.display(), error = %e, "No chat history loaded");
        }

        Ok(Self {
            assistant,
            conversation_id,
            last_memories: Vec::new(),
            editor,
            history_path,
            term: Term::stdout(),
            verbose,
        })
    }

    /// Run the REPL loop.
    pub async fn run(&mut self) -> Result<()> {
        self.print_welcome();

        loop {
            let prompt = format!("{} ", style("you>").cyan().bold());

            match self.editor.readline(&prompt) {
                Ok(line) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }

                    if line.starts_with('/') {
                        match self.handle_slash_command(line) {
                            Ok(ControlFlow::Continue) => continue,
                            Ok(ControlFlow::Exit) => break,
                            Err(e) => {
                                self.print_error(&format!("Command error: {e}"));
                                continue;
                            }
                        }
                    }

                    if let Err(e) = self.send_message(line).await {
                        self.print_error(&format!("Error: {e}"));
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!();
                    self.print_dim("(Interrupted - type /quit to exit)");
                }
                Err(ReadlineError::Eof) => {
                    println!();
                    break;
                }
                Err(e) => {
                    self.print_error(&format!("Input error: {e}"));
                    break;
                }
            }
        }

        if let Err(e) = self.editor.save_history(&self.history_path) {
            debug!(error = %e, "Failed to save chat history");
        }
        self.print_dim("Goodbye!");
        Ok(())
    }

    async fn send_message(&mut self, message: &str) -> Result<()> {
        let outcome = self
            .assistant
            .handle_turn(self.conversation_id.as_deref(), message)
            .await?;

        println!();
        println!("{} {}", style("mneme>").green().bold(), outcome.response);
        if self.verbose {
            self.print_dim(&format!(
                "[{} memories used, {} facts stored]",
                outcome.memories_used.len(),
                outcome.update.facts_stored.len()
            ));
        }
        println!();

        self.conversation_id = Some(outcome.conversation_id);
        self.last_memories = outcome.memories_used;
        Ok(())
    }

    fn handle_slash_command(&mut self, input: &str) -> Result<ControlFlow> {
        let cmd = input[1..].split_whitespace().next().unwrap_or("");

        match cmd {
            "quit" | "q" | "exit" => return Ok(ControlFlow::Exit),
            "help" | "h" | "?" => self.print_help(),
            "clear" | "cls" => self.term.clear_screen()?,
            "new" => {
                self.conversation_id = None;
                self.last_memories.clear();
                self.print_dim("Started new conversation");
            }
            "conversation" => match &self.conversation_id {
                Some(id) => println!("Current conversation: {id}"),
                None => self.print_dim("No active conversation (will create on first message)"),
            },
            "memories" => self.print_last_memories(),
            "" => self.print_dim("Type /help for available commands"),
            _ => {
                self.print_error(&format!("Unknown command: /{cmd}"));
                self.print_dim("Type /help for available commands");
            }
        }

        Ok(ControlFlow::Continue)
    }

    fn print_last_memories(&self) {
        if self.last_memories.is_empty() {
            self.print_dim("No memories were used for the last reply");
            return;
        }
        let dim = Style::new().dim();
        for (i, memory) in self.last_memories.iter().enumerate() {
            println!(
                "{}. {} {}",
                style(i + 1).cyan(),
                truncate(memory.display_text(), 70),
                dim.apply_to(memory.timestamp.format("(%Y-%m-%d %H:%M)"))
            );
        }
    }

    fn print_welcome(&self) {
        let dim = Style::new().dim();
        println!();
        println!("{}", style("mneme chat").bold().cyan());
        println!("{}", dim.apply_to("─".repeat(40)));
        println!("{}", dim.apply_to("Type your message and press Enter to chat."));
        println!("{}", dim.apply_to("Use /help for commands, /quit or Ctrl+D to exit."));
        if let Some(id) = &self.conversation_id {
            println!("{}", dim.apply_to(format!("Resuming conversation {id}")));
        }
        println!();
    }

    fn print_help(&self) {
        let dim = Style::new().dim();
        println!();
        println!("{}", style("Available Commands").bold());
        println!("{}", dim.apply_to("─".repeat(40)));
        println!("  {}  - Exit the REPL", style("/quit, /q").cyan());
        println!("  {}  - Show this help", style("/help, /h, /?").cyan());
        println!("  {}  - Clear the screen", style("/clear").cyan());
        println!("  {}  - Start a new conversation", style("/new").cyan());
        println!("  {}  - Show current conversation ID", style("/conversation").cyan());
        println!("  {}  - Show memories used for the last reply", style("/memories").cyan());
        println!();
    }

    fn print_dim(&self, msg: &str) {
        let dim = Style::new().dim();
        println!("{}", dim.apply_to(msg));
    }

    fn print_error(&self, msg: &str) {
        let red = Style::new().red();
        println!("{} {}", red.apply_to("Error:"), msg);
    }
}

/// Control flow for the REPL.
pub enum ControlFlow {
    Continue,
    Exit,
}
