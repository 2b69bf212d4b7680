//! Memory command - inspect and maintain the memory store.

use anyhow::{Result, bail};
use clap::{Args, Subcommand};
use console::{Style, style};
use serde_json::json;
use std::sync::Arc;

use mneme_agent::PromptAnalyzer;
use mneme_memory::{
    DateFilter, HookExtractor, MemoryKind, MemoryQuery, MemoryRecord, PruneReport, Relevancer,
};

use super::{Context, truncate};

/// Arguments for the memory command.
#[derive(Args, Debug)]
pub struct MemoryArgs {
    #[command(subcommand)]
    pub command: MemoryCommand,
}

#[derive(Subcommand, Debug)]
pub enum MemoryCommand {
    /// Retrieve the memories most relevant to a query
    Recall {
        /// Query text
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,

        /// Use local hook extraction only (no API key needed)
        #[arg(long)]
        local: bool,
    },

    /// List stored memories
    List {
        /// Only this kind: episodic or non-episodic
        #[arg(short, long)]
        kind: Option<MemoryKind>,

        /// Match any of these hooks (comma separated)
        #[arg(long, value_delimiter = ',')]
        hooks: Vec<String>,

        /// Date filter: today, yesterday, this week, last week, YYYY-MM-DD, "Month YYYY"
        #[arg(short, long)]
        date: Option<String>,

        /// Maximum memories per kind
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Show one memory
    Show {
        /// Memory id
        id: String,
    },

    /// List every hook in use
    Hooks,

    /// Enforce retention limits now
    Prune {
        /// Only this kind: episodic or non-episodic
        #[arg(short, long)]
        kind: Option<MemoryKind>,
    },

    /// Delete one memory
    Delete {
        /// Memory id
        id: String,
    },
}

/// Run the memory command.
pub async fn run(args: MemoryArgs, ctx: &Context) -> Result<()> {
    match args.command {
        MemoryCommand::Recall { query, local } => cmd_recall(&query.join(" "), local, ctx).await,
        MemoryCommand::List {
            kind,
            hooks,
            date,
            limit,
        } => cmd_list(kind, hooks, date, limit, ctx),
        MemoryCommand::Show { id } => cmd_show(&id, ctx),
        MemoryCommand::Hooks => cmd_hooks(ctx),
        MemoryCommand::Prune { kind } => cmd_prune(kind, ctx),
        MemoryCommand::Delete { id } => cmd_delete(&id, ctx),
    }
}

async fn cmd_recall(query: &str, local: bool, ctx: &Context) -> Result<()> {
    let store = Arc::new(ctx.open_store()?);
    let config = ctx.agent_config();
    let extractor = HookExtractor::new(config.hooks);

    let (relevancer, analyzer) = if local {
        (
            Relevancer::new(store, extractor, config.relevance),
            PromptAnalyzer::new(),
        )
    } else {
        let oracle = ctx.oracle()?;
        (
            Relevancer::new(store, extractor.with_oracle(oracle.clone()), config.relevance)
                .with_oracle(oracle.clone()),
            PromptAnalyzer::new().with_oracle(oracle),
        )
    };

    let prompt = analyzer.analyze(query).await;
    let memories = relevancer.retrieve(query, &prompt.hints()).await;
    print_memories("Recalled Memories", &memories, ctx)
}

fn cmd_list(
    kind: Option<MemoryKind>,
    hooks: Vec<String>,
    date: Option<String>,
    limit: usize,
    ctx: &Context,
) -> Result<()> {
    let store = ctx.open_store()?;
    let kinds = match kind {
        Some(kind) => vec![kind],
        None => MemoryKind::ALL.to_vec(),
    };

    let mut memories = Vec::new();
    for kind in kinds {
        let mut query = MemoryQuery::new(kind).with_max_count(limit);
        if !hooks.is_empty() {
            query = query.with_hooks(hooks.iter());
        }
        if let Some(date) = &date {
            query = query.with_date_filter(DateFilter::parse(date));
        }
        memories.extend(store.query(&query)?);
    }
    print_memories("Memories", &memories, ctx)
}

fn cmd_show(id: &str, ctx: &Context) -> Result<()> {
    let store = ctx.open_store()?;
    let Some(memory) = store.get(id)? else {
        bail!("memory not found: {id}");
    };

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&memory)?);
        return Ok(());
    }

    let dim = Style::new().dim();
    println!("{}", style(&memory.id).bold());
    println!("{}", dim.apply_to("─".repeat(50)));
    println!("  Kind:      {}", style(memory.kind).cyan());
    println!("  Time:      {}", memory.timestamp.format("%Y-%m-%d %H:%M:%S"));
    println!("  Hooks:     {}", memory.hooks.join(", "));
    if let Some(conversation) = &memory.conversation_id {
        println!("  Conv:      {conversation}");
    }
    if let Some(summary) = &memory.summary {
        println!("  Summary:   {summary}");
    }
    println!();
    println!("{}", memory.content);
    Ok(())
}

fn cmd_hooks(ctx: &Context) -> Result<()> {
    let hooks = ctx.open_store()?.all_hooks()?;
    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&hooks)?);
        return Ok(());
    }

    let dim = Style::new().dim();
    if hooks.is_empty() {
        println!("{}", dim.apply_to("No hooks stored"));
        return Ok(());
    }
    println!("{} {}", style("Hooks").bold(), dim.apply_to(format!("({})", hooks.len())));
    println!("{}", dim.apply_to("─".repeat(50)));
    for hook in hooks {
        println!("  {hook}");
    }
    Ok(())
}

fn cmd_prune(kind: Option<MemoryKind>, ctx: &Context) -> Result<()> {
    let store = ctx.open_store()?;
    let kinds = kind.map_or_else(|| MemoryKind::ALL.to_vec(), |k| vec![k]);

    let mut reports = Vec::new();
    for kind in kinds {
        reports.push((kind, store.prune(kind)?));
    }

    if ctx.json_output {
        let value: Vec<_> = reports.iter().map(|(kind, r)| report_json(*kind, r)).collect();
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    let dim = Style::new().dim();
    for (kind, report) in &reports {
        println!(
            "{:<13} examined {}, deleted {}{}",
            kind.as_str(),
            report.examined,
            style(report.deleted.len()).cyan(),
            if report.failed.is_empty() {
                String::new()
            } else {
                format!(", {} failed", report.failed.len())
            }
        );
        for (id, error) in &report.failed {
            println!("  {}", dim.apply_to(format!("{id}: {error}")));
        }
    }
    Ok(())
}

fn cmd_delete(id: &str, ctx: &Context) -> Result<()> {
    if !ctx.open_store()?.delete(id)? {
        bail!("memory not found: {id}");
    }
    if !ctx.json_output {
        println!("{} Deleted {id}", Style::new().green().apply_to("✓"));
    } else {
        println!("{}", json!({ "deleted": id }));
    }
    Ok(())
}

fn report_json(kind: MemoryKind, report: &PruneReport) -> serde_json::Value {
    json!({
        "kind": kind,
        "examined": report.examined,
        "deleted": report.deleted,
        "failed": report
            .failed
            .iter()
            .map(|(id, error)| json!({ "id": id, "error": error }))
            .collect::<Vec<_>>(),
    })
}

fn print_memories(title: &str, memories: &[MemoryRecord], ctx: &Context) -> Result<()> {
    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(memories)?);
        return Ok(());
    }

    let dim = Style::new().dim();
    if memories.is_empty() {
        println!("{}", dim.apply_to("No memories found"));
        return Ok(());
    }

    println!("{}", style(title).bold());
    println!("{}", dim.apply_to("─".repeat(50)));
    println!();
    for (i, memory) in memories.iter().enumerate() {
        println!("{}. {}", style(i + 1).cyan(), truncate(memory.display_text(), 70));
        println!(
            "   {}",
            dim.apply_to(format!(
                "{} · {} · {}",
                memory.id,
                memory.timestamp.format("%Y-%m-%d %H:%M"),
                memory.hooks.join(", ")
            ))
        );
        println!();
    }
    Ok(())
}
