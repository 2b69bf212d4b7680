//! Config command - configuration management.

use anyhow::{Result, anyhow};
use clap::{Args, Subcommand};
use console::Style;
use serde_json::json;
use std::path::PathBuf;

use mneme_config::{MnemeConfig, resolve_api_key};

use super::Context;

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the resolved configuration
    Show,

    /// Show which config files are loaded and their precedence
    Which,

    /// Show the user configuration file path
    Path,

    /// Initialize a config file with defaults
    Init {
        /// Create project-local config (./mneme.toml) instead of user config
        #[arg(long)]
        local: bool,
    },
}

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => cmd_show(ctx),
        ConfigCommand::Which => cmd_which(ctx),
        ConfigCommand::Path => cmd_path(),
        ConfigCommand::Init { local } => cmd_init(local),
    }
}

fn cmd_show(ctx: &Context) -> Result<()> {
    let llm = ctx.config.llm();
    let memory = ctx.memory_config();
    let backend = llm.effective_backend();
    let key = resolve_api_key(&backend, llm.api_key.as_deref());
    let key_status = match &key {
        Some(secret) => format!("found ({})", secret.source),
        None => format!("missing (set {})", backend.env_var()),
    };

    if ctx.json_output {
        let value = json!({
            "data_dir": ctx.data_dir,
            "llm": {
                "backend": backend.to_string(),
                "model": llm.effective_model(),
                "fast_model": llm.effective_fast_model(),
                "api_key": key.is_some(),
            },
            "memory": memory,
            "sources": ctx
                .sources
                .iter()
                .filter(|s| s.loaded)
                .map(|s| s.path.display().to_string())
                .collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    let dim = Style::new().dim();
    println!("# mneme Configuration\n");

    let loaded: Vec<_> = ctx.sources.iter().filter(|s| s.loaded).collect();
    if loaded.is_empty() {
        println!("No config files loaded (using defaults)\n");
    } else {
        println!("Config files:");
        for source in loaded {
            println!("  {}", source.path.display());
        }
        println!();
    }

    println!("LLM:");
    println!("  backend:     {backend}");
    println!("  model:       {}", llm.effective_model());
    println!("  fast model:  {}", llm.effective_fast_model());
    println!("  api key:     {key_status}");
    println!();

    println!("Memory:");
    println!("  data dir:    {}", ctx.data_dir.display());
    println!(
        "  capacity:    {} episodic, {} non-episodic, {} days",
        memory.max_episodic, memory.max_non_episodic, memory.retention_days
    );
    println!(
        "  hooks:       max {}, length {}..={}",
        memory.max_hooks, memory.min_hook_length, memory.max_hook_length
    );
    println!("  retrieval:   {} memories", memory.max_memories);
    println!(
        "  concepts:    {}",
        if memory.index_concepts { "indexed every turn" } else { "manual" }
    );
    println!();

    if ctx.verbose {
        println!("{}", dim.apply_to("---\nRaw config:\n"));
        println!("{}", redacted(&ctx.config).to_toml()?);
    }
    Ok(())
}

fn cmd_which(ctx: &Context) -> Result<()> {
    println!("Config file search order (later overrides earlier):\n");
    for source in &ctx.sources {
        let status = if source.loaded { "✓ loaded" } else { "· not found" };
        println!("  {} {}", status, source.path.display());
    }
    Ok(())
}

fn cmd_path() -> Result<()> {
    let path = mneme_config::user_config_path()
        .ok_or_else(|| anyhow!("Could not determine config directory"))?;
    println!("{}", path.display());
    Ok(())
}

fn cmd_init(local: bool) -> Result<()> {
    let path = if local {
        PathBuf::from("mneme.toml")
    } else {
        mneme_config::user_config_path()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?
    };

    if path.exists() {
        println!("Config file already exists: {}", path.display());
        return Ok(());
    }

    let mut config = MnemeConfig::new();
    config.llm = Some(Default::default());
    config.memory = Some(Default::default());
    config.logging = Some(Default::default());
    mneme_config::save_config(&config, &path)?;
    println!("Created {}", path.display());
    Ok(())
}

/// The config with any plaintext key masked.
fn redacted(config: &MnemeConfig) -> MnemeConfig {
    let mut config = config.clone();
    if let Some(llm) = config.llm.as_mut()
        && llm.api_key.is_some()
    {
        llm.api_key = Some("********".to_string());
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redacted_masks_api_key() {
        let config = MnemeConfig::from_toml("[llm]\napi_key = \"sk-secret\"\n").unwrap();
        let masked = redacted(&config);
        assert_eq!(masked.llm.unwrap().api_key.as_deref(), Some("********"));
        assert!(redacted(&MnemeConfig::new()).llm.is_none());
    }
}
