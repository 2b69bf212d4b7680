//! CLI command handlers.

use anyhow::{Context as _, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use mneme_agent::{AgentConfig, Assistant, ConceptConfig, ConceptIndexer};
use mneme_config::{ConfigSource, MemoryConfig, MnemeConfig};
use mneme_llm::{AnthropicConfig, LlmOracle, OracleConfig, SharedOracle};
use mneme_memory::{
    ConceptManager, ConversationStore, HookConfig, HookExtractor, MemoryStore, RelevanceConfig,
    StoreConfig,
};

pub mod ask;
pub mod chat;
pub mod concepts;
pub mod config;
pub mod conversations;
pub mod memory;
pub mod repl;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// The merged configuration.
    pub config: MnemeConfig,
    /// Config layers that were checked.
    pub sources: Vec<ConfigSource>,
    /// Resolved memory data directory.
    pub data_dir: PathBuf,
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
}

impl Context {
    pub fn memory_config(&self) -> MemoryConfig {
        self.config.memory()
    }

    pub fn agent_config(&self) -> AgentConfig {
        let memory = self.memory_config();
        AgentConfig {
            store: StoreConfig {
                max_episodic: memory.max_episodic,
                max_non_episodic: memory.max_non_episodic,
                retention_days: memory.retention_days,
            },
            hooks: self.hook_config(),
            relevance: RelevanceConfig {
                max_memories: memory.max_memories,
                broaden_episodic: memory.broaden_episodic,
                broaden_non_episodic: memory.broaden_non_episodic,
            },
            concept: ConceptConfig {
                freshness_secs: memory.concept_freshness_secs,
            },
            summary_max_length: memory.summary_max_length,
            index_concepts: memory.index_concepts,
        }
    }

    pub fn hook_config(&self) -> HookConfig {
        let memory = self.memory_config();
        HookConfig {
            max_hooks: memory.max_hooks,
            min_length: memory.min_hook_length,
            max_length: memory.max_hook_length,
        }
    }

    pub fn open_store(&self) -> Result<MemoryStore> {
        MemoryStore::open(&self.data_dir, self.agent_config().store)
            .with_context(|| format!("Failed to open memory store at {}", self.data_dir.display()))
    }

    pub fn open_concepts(&self) -> Result<ConceptManager> {
        let dir = self.data_dir.join("concepts");
        ConceptManager::open(&dir)
            .with_context(|| format!("Failed to open concept store at {}", dir.display()))
    }

    pub fn open_conversations(&self) -> Result<ConversationStore> {
        let dir = self.data_dir.join("conversations");
        ConversationStore::open(&dir)
            .with_context(|| format!("Failed to open conversations at {}", dir.display()))
    }

    /// Build the text oracle. Fails when no API key can be resolved.
    pub fn oracle(&self) -> Result<SharedOracle> {
        let llm = self.config.llm();
        let secret = mneme_config::require_api_key(&llm)?;
        debug!(source = %secret.source, "Resolved API key");

        let mut backend_config = AnthropicConfig::new(secret.value)
            .with_timeout(Duration::from_secs(llm.effective_timeout_secs()))
            .with_max_retries(llm.effective_retry_max())
            .with_retry_backoff(Duration::from_millis(llm.effective_retry_backoff_ms()));
        if let Some(url) = &llm.base_url {
            backend_config = backend_config.with_base_url(url);
        }
        let backend = mneme_llm::create_shared_backend(backend_config)?;

        let oracle_config =
            OracleConfig::new(llm.effective_model(), llm.effective_fast_model())
                .with_max_tokens(llm.effective_max_tokens());
        Ok(Arc::new(LlmOracle::new(backend, oracle_config)))
    }

    pub fn assistant(&self) -> Result<Assistant> {
        let oracle = self.oracle()?;
        Ok(Assistant::open(&self.data_dir, oracle, self.agent_config())?)
    }

    pub fn concept_indexer(&self) -> Result<ConceptIndexer> {
        let oracle = self.oracle()?;
        let extractor = HookExtractor::new(self.hook_config()).with_oracle(oracle.clone());
        Ok(ConceptIndexer::new(
            Arc::new(self.open_concepts()?),
            extractor,
            oracle,
            self.agent_config().concept,
        ))
    }
}

/// Single-line preview of `s`, at most `max_chars` characters.
pub fn truncate(s: &str, max_chars: usize) -> String {
    let s = s.replace('\n', " ");
    mneme_llm::oracle::parse::truncate_with_ellipsis(&s, max_chars)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(toml: &str) -> Context {
        Context {
            config: MnemeConfig::from_toml(toml).unwrap(),
            sources: Vec::new(),
            data_dir: PathBuf::from("/tmp/mneme-test"),
            json_output: false,
            verbose: false,
        }
    }

    #[test]
    fn test_agent_config_follows_memory_section() {
        let ctx = context(
            r#"
[memory]
max_episodic = 10
retention_days = 7
max_hooks = 4
max_memories = 2
concept_freshness_secs = 5
index_concepts = true
"#,
        );
        let config = ctx.agent_config();
        assert_eq!(config.store.max_episodic, 10);
        assert_eq!(config.store.retention_days, 7);
        assert_eq!(config.hooks.max_hooks, 4);
        assert_eq!(config.relevance.max_memories, 2);
        assert_eq!(config.concept.freshness_secs, 5);
        assert!(config.index_concepts);
        assert_eq!(config.summary_max_length, 200);
    }

    #[test]
    fn test_truncate_flattens_newlines() {
        assert_eq!(truncate("a\nb", 10), "a b");
        assert_eq!(truncate("abcdefghijkl", 8), "abcde...");
    }
}
