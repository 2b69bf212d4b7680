//! Per-component settings for the assistant.

use chrono::Duration;

use mneme_memory::{HookConfig, RelevanceConfig, StoreConfig};

/// Concept indexing settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConceptConfig {
    /// Nodes updated within this many seconds count as newly learned.
    pub freshness_secs: i64,
}

impl Default for ConceptConfig {
    fn default() -> Self {
        Self { freshness_secs: 60 }
    }
}

impl ConceptConfig {
    pub fn freshness(&self) -> Duration {
        Duration::seconds(self.freshness_secs.max(0))
    }
}

/// Everything the assistant needs to wire its components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    pub store: StoreConfig,
    pub hooks: HookConfig,
    pub relevance: RelevanceConfig,
    pub concept: ConceptConfig,
    /// Maximum summary length in characters for episodic records.
    pub summary_max_length: usize,
    /// Feed every recorded interaction to the concept indexer.
    pub index_concepts: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            hooks: HookConfig::default(),
            relevance: RelevanceConfig::default(),
            concept: ConceptConfig::default(),
            summary_max_length: 200,
            index_concepts: false,
        }
    }
}

impl AgentConfig {
    pub fn with_summary_max_length(mut self, max_length: usize) -> Self {
        self.summary_max_length = max_length;
        self
    }

    pub fn with_index_concepts(mut self, enabled: bool) -> Self {
        self.index_concepts = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AgentConfig::default();
        assert_eq!(config.summary_max_length, 200);
        assert!(!config.index_concepts);
        assert_eq!(config.concept.freshness(), Duration::seconds(60));
        assert_eq!(config.store.max_episodic, 1000);
    }

    #[test]
    fn test_builders() {
        let config = AgentConfig::default()
            .with_summary_max_length(80)
            .with_index_concepts(true);
        assert_eq!(config.summary_max_length, 80);
        assert!(config.index_concepts);
    }
}
