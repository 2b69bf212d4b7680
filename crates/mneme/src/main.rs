//! mneme - a conversational assistant with hook-indexed long-term memory.
//!
//! Main entry point for the mneme CLI.

use anyhow::{Context as _, Result};
use clap::{ArgAction, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::warn;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{ask, chat, concepts, config, conversations, memory};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// mneme - a conversational assistant with long-term memory
#[derive(Parser)]
#[command(name = "mneme")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// Memory data directory (overrides memory.data_dir)
    #[arg(long, global = true, env = "MNEME_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Enter interactive chat mode (REPL)
    Chat(chat::ChatArgs),

    /// Ask a one-shot question
    Ask(ask::AskArgs),

    /// Memory operations
    Memory(memory::MemoryArgs),

    /// Concept graph operations
    Concepts(concepts::ConceptsArgs),

    /// Conversation history
    Conversations(conversations::ConversationsArgs),

    /// Configuration management
    Config(config::ConfigArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Logging
// ─────────────────────────────────────────────────────────────────────────────

const CRATES: [&str; 5] = ["mneme", "mneme_agent", "mneme_memory", "mneme_llm", "mneme_config"];

fn crate_filter(level: &str, fallback: &str) -> String {
    let mut directives: Vec<String> = CRATES.iter().map(|c| format!("{c}={level}")).collect();
    directives.push(fallback.to_string());
    directives.join(",")
}

/// Console layer on stderr plus an optional daily JSON file.
///
/// The returned guard flushes the file writer on drop and must outlive `main`'s work.
fn init_tracing(verbose: u8, log_dir: Option<&Path>) -> Option<WorkerGuard> {
    use tracing_subscriber::prelude::*;

    let console_filter = match verbose {
        0 => "warn".to_string(),
        1 => crate_filter("info", "warn"),
        _ => crate_filter("debug", "info"),
    };
    let console_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(console_filter));

    let appender = log_dir.and_then(|dir| {
        RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix("mneme")
            .filename_suffix("log")
            .build(dir)
            .map_err(|e| eprintln!("warning: file logging disabled: {e}"))
            .ok()
    });
    let (file_layer, guard) = match appender {
        Some(appender) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_writer(writer)
                .with_filter(EnvFilter::new(crate_filter("debug", "info")));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(console_filter),
        )
        .with(file_layer)
        .init();

    guard
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = mneme_config::load_config(None).context("Failed to load configuration")?;
    let memory_config = loaded.config.memory();
    memory_config.validate()?;
    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => memory_config.resolve_data_dir()?,
    };

    let logging = loaded.config.logging();
    let log_dir = logging
        .file_logging
        .then(|| logging.log_dir.clone().unwrap_or_else(|| data_dir.join("logs")));
    let _guard = init_tracing(cli.verbose, log_dir.as_deref());

    for warning in &loaded.warnings {
        warn!("{warning}");
    }

    let ctx = commands::Context {
        config: loaded.config,
        sources: loaded.sources,
        data_dir,
        json_output: cli.json,
        verbose: cli.verbose > 0,
    };

    match cli.command {
        Commands::Chat(args) => chat::run(args, &ctx).await,
        Commands::Ask(args) => ask::run(args, &ctx).await,
        Commands::Memory(args) => memory::run(args, &ctx).await,
        Commands::Concepts(args) => concepts::run(args, &ctx).await,
        Commands::Conversations(args) => conversations::run(args, &ctx).await,
        Commands::Config(args) => config::run(args, &ctx).await,
    }
}
