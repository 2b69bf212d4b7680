//! Concepts command - the concept graph.

use anyhow::{Result, bail};
use clap::{Args, Subcommand};
use console::{Style, style};
use serde_json::json;

use mneme_memory::{ConceptNode, value_text};

use super::{Context, truncate};

/// Arguments for the concepts command.
#[derive(Args, Debug)]
pub struct ConceptsArgs {
    #[command(subcommand)]
    pub command: ConceptsCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConceptsCommand {
    /// Fold a piece of text into the concept graph
    Ingest {
        /// Text to index
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,

        /// Memory id to link the concepts to
        #[arg(long)]
        memory_id: Option<String>,
    },

    /// Answer a question from the concept graph alone
    Ask {
        /// Question text
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
    },

    /// Find concepts by name, tag or trait
    Search {
        /// Search text
        query: String,
    },

    /// Show one concept
    Show {
        /// Concept name
        name: String,
    },

    /// Merge the secondary concept into the primary one
    Merge {
        /// Concept that survives
        primary: String,
        /// Concept folded in and deleted
        secondary: String,
    },

    /// Delete one concept
    Delete {
        /// Concept name
        name: String,
    },

    /// List all concepts
    List,
}

/// Run the concepts command.
pub async fn run(args: ConceptsArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConceptsCommand::Ingest { text, memory_id } => {
            cmd_ingest(&text.join(" "), memory_id.as_deref(), ctx).await
        }
        ConceptsCommand::Ask { query } => cmd_ask(&query.join(" "), ctx).await,
        ConceptsCommand::Search { query } => {
            let nodes = ctx.open_concepts()?.search(&query)?;
            print_nodes(&nodes, ctx)
        }
        ConceptsCommand::Show { name } => cmd_show(&name, ctx),
        ConceptsCommand::Merge { primary, secondary } => cmd_merge(&primary, &secondary, ctx),
        ConceptsCommand::Delete { name } => cmd_delete(&name, ctx),
        ConceptsCommand::List => {
            let nodes = ctx.open_concepts()?.list_all()?;
            print_nodes(&nodes, ctx)
        }
    }
}

async fn cmd_ingest(text: &str, memory_id: Option<&str>, ctx: &Context) -> Result<()> {
    let indexer = ctx.concept_indexer()?;
    let names = indexer.process_memory(text, memory_id).await?;

    if ctx.json_output {
        println!("{}", json!({ "concepts": names }));
    } else if names.is_empty() {
        println!("{}", Style::new().dim().apply_to("No concepts found"));
    } else {
        println!(
            "{} Updated {} concepts: {}",
            Style::new().green().apply_to("✓"),
            names.len(),
            names.join(", ")
        );
    }
    Ok(())
}

async fn cmd_ask(query: &str, ctx: &Context) -> Result<()> {
    let indexer = ctx.concept_indexer()?;
    let response = indexer.generate_response(query).await;
    if ctx.json_output {
        println!("{}", json!({ "response": response }));
    } else {
        println!("{response}");
    }
    Ok(())
}

fn cmd_show(name: &str, ctx: &Context) -> Result<()> {
    let Some(node) = ctx.open_concepts()?.get(name)? else {
        bail!("concept not found: {name}");
    };

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&node)?);
        return Ok(());
    }

    let dim = Style::new().dim();
    println!(
        "{} {}",
        style(node.name()).bold(),
        dim.apply_to(format!("({})", node.concept_type()))
    );
    println!("{}", dim.apply_to("─".repeat(50)));
    println!("  Tags:      {}", node.tags().join(", "));
    println!("  Memories:  {}", node.linked_memories().join(", "));
    println!(
        "  Updated:   {}",
        node.last_updated().format("%Y-%m-%d %H:%M:%S")
    );
    if !node.related_concepts().is_empty() {
        println!("  Related:");
        for (other, relation) in node.related_concepts() {
            println!("    {other} {}", dim.apply_to(format!("({relation})")));
        }
    }
    for (key, values) in node.traits() {
        println!("  {}:", style(key).cyan());
        for value in values {
            println!("    - {}", truncate(&value_text(value), 90));
        }
    }
    Ok(())
}

fn cmd_merge(primary: &str, secondary: &str, ctx: &Context) -> Result<()> {
    let merged = ctx.open_concepts()?.merge_by_name(primary, secondary)?;
    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&merged)?);
    } else {
        println!(
            "{} Merged {secondary} into {}",
            Style::new().green().apply_to("✓"),
            merged.name()
        );
    }
    Ok(())
}

fn cmd_delete(name: &str, ctx: &Context) -> Result<()> {
    if !ctx.open_concepts()?.delete(name)? {
        bail!("concept not found: {name}");
    }
    if ctx.json_output {
        println!("{}", json!({ "deleted": name }));
    } else {
        println!("{} Deleted {name}", Style::new().green().apply_to("✓"));
    }
    Ok(())
}

fn print_nodes(nodes: &[ConceptNode], ctx: &Context) -> Result<()> {
    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(nodes)?);
        return Ok(());
    }

    let dim = Style::new().dim();
    if nodes.is_empty() {
        println!("{}", dim.apply_to("No concepts found"));
        return Ok(());
    }
    for node in nodes {
        println!(
            "{} {}",
            style(node.name()).cyan(),
            dim.apply_to(format!(
                "[{}] {} memories, {} relations",
                node.tags().join(", "),
                node.linked_memories().len(),
                node.related_concepts().len()
            ))
        );
    }
    Ok(())
}
