//! Writes each finished turn back into memory: one episodic record for the
//! exchange, plus up to three non-episodic facts about the user.

use regex::Regex;
use std::sync::{Arc, LazyLock};
use tracing::{debug, info, warn};

use mneme_llm::SharedOracle;
use mneme_llm::oracle::parse::strip_reasoning_preamble;
use mneme_memory::{
    HookExtractor, MemoryStore, NewMemory, StoreOutcome, category_hooks, extract_entities,
};

use crate::summarizer::Summarizer;

/// Facts kept per interaction.
pub const MAX_FACTS: usize = 3;

/// One local fact pattern and how its captures read in the third person.
struct FactPattern {
    regex: Regex,
    render: fn(&regex::Captures<'_>) -> String,
}

fn pattern(re: &str, render: fn(&regex::Captures<'_>) -> String) -> FactPattern {
    FactPattern {
        regex: Regex::new(re).expect("valid regex"),
        render,
    }
}

/// Preference, attribute, name and location patterns, in that order.
static FACT_PATTERNS: LazyLock<Vec<FactPattern>> = LazyLock::new(|| {
    vec![
        pattern(r"(?i)\bmy\s+favou?rite\s+(\w+)\s+is\s+([^.!?,;]+)", |c| {
            format!("User's favorite {} is {}", c[1].to_lowercase(), c[2].trim())
        }),
        pattern(
            r"(?i)\bI\s+(prefer|like|love|hate|enjoy|dislike)\s+([^.!?,;]+)",
            |c| format!("User {}s {}", c[1].to_lowercase(), c[2].trim()),
        ),
        pattern(r"(?i)\bI(?:\s+am|'m)\s+(an?\s+[^.!?,;]+)", |c| {
            format!("User is {}", c[1].trim())
        }),
        pattern(r"(?i)\bI\s+have\s+(an?\s+[^.!?,;]+|\d+\s+[^.!?,;]+)", |c| {
            format!("User has {}", c[1].trim())
        }),
        pattern(r"(?i)\bmy\s+name\s+is\s+([^.!?,;]+)", |c| {
            format!("User's name is {}", c[1].trim())
        }),
        pattern(r"(?i)\bI\s+(live|work|study)\s+in\s+([^.!?,;]+)", |c| {
            let verb = match c[1].to_lowercase().as_str() {
                "study" => "studies".to_string(),
                other => format!("{other}s"),
            };
            format!("User {verb} in {}", c[2].trim())
        }),
        pattern(r"(?i)\bI(?:\s+am|'m)\s+from\s+([^.!?,;]+)", |c| {
            format!("User is from {}", c[1].trim())
        }),
    ]
});

/// What one `record_interaction` call wrote.
#[derive(Debug, Clone, Default)]
pub struct UpdateReport {
    /// Id of the stored episodic record.
    pub episodic_id: Option<String>,
    /// Ids of stored non-episodic facts.
    pub facts_stored: Vec<String>,
    /// Facts refused by validation (no usable hooks).
    pub facts_rejected: usize,
    /// Whether the interaction was empty and nothing was attempted.
    pub skipped: bool,
    /// Non-fatal failures.
    pub errors: Vec<String>,
}

impl UpdateReport {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

impl std::fmt::Display for UpdateReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "UpdateReport {{ episodic: {}, facts: {}, rejected: {}, errors: {} }}",
            self.episodic_id.as_deref().unwrap_or("none"),
            self.facts_stored.len(),
            self.facts_rejected,
            self.errors.len(),
        )
    }
}

/// Records interactions as episodic memories and distilled facts.
#[derive(Clone)]
pub struct MemoryUpdater {
    store: Arc<MemoryStore>,
    extractor: HookExtractor,
    summarizer: Summarizer,
    oracle: Option<SharedOracle>,
}

impl MemoryUpdater {
    pub fn new(store: Arc<MemoryStore>, extractor: HookExtractor, summarizer: Summarizer) -> Self {
        Self {
            store,
            extractor,
            summarizer,
            oracle: None,
        }
    }

    pub fn with_oracle(mut self, oracle: SharedOracle) -> Self {
        self.oracle = Some(oracle);
        self
    }

    /// Store one user/assistant exchange. Failures land in the report.
    pub async fn record_interaction(
        &self,
        user_input: &str,
        response: &str,
        conversation_id: Option<&str>,
    ) -> UpdateReport {
        let mut report = UpdateReport::default();
        if user_input.trim().is_empty() || response.trim().is_empty() {
            warn!("Empty user input or response, skipping memory update");
            report.skipped = true;
            return report;
        }

        let response = strip_reasoning_preamble(response);
        let interaction = format!("User: {user_input}\n\nAssistant: {response}");
        let summary = self.summarizer.summarize(&interaction).await;
        let hooks = self.interaction_hooks(&interaction).await;

        let mut episode = NewMemory::new(&interaction)
            .with_summary(summary)
            .with_hooks(hooks);
        if let Some(id) = conversation_id {
            episode = episode.with_conversation_id(id);
        }
        match self.store.store_episodic(episode) {
            Ok(record) => report.episodic_id = Some(record.id),
            Err(e) => {
                warn!(error = %e, "Failed to store episodic memory");
                report.errors.push(format!("episodic: {e}"));
            }
        }

        for fact in self.facts(user_input).await {
            let hooks = self.fact_hooks(&fact).await;
            match self.store.store_non_episodic(NewMemory::new(&fact).with_hooks(hooks)) {
                Ok(StoreOutcome::Stored(record)) => report.facts_stored.push(record.id),
                Ok(StoreOutcome::Rejected(reason)) => {
                    debug!(fact = %fact, reason = %reason, "Fact rejected");
                    report.facts_rejected += 1;
                    report.errors.push(format!("fact '{fact}' rejected: {reason}"));
                }
                Err(e) => {
                    warn!(fact = %fact, error = %e, "Failed to store fact");
                    report.errors.push(format!("fact '{fact}': {e}"));
                }
            }
        }

        info!(
            episodic = report.episodic_id.as_deref().unwrap_or("none"),
            facts = report.facts_stored.len(),
            "Recorded interaction"
        );
        report
    }

    async fn interaction_hooks(&self, interaction: &str) -> Vec<String> {
        let mut hooks = self.extractor.extract(interaction, &[]).await;
        hooks.extend(category_hooks(interaction));
        hooks.extend(extract_entities(interaction));
        self.extractor.config().cap(hooks)
    }

    async fn fact_hooks(&self, fact: &str) -> Vec<String> {
        let mut hooks = self.extractor.extract(fact, &[]).await;
        hooks.extend(category_hooks(fact));
        self.extractor.config().cap(hooks)
    }

    /// Local pattern facts first, topped up by the oracle when short.
    async fn facts(&self, user_input: &str) -> Vec<String> {
        let mut facts = local_facts(user_input);
        if facts.len() < MAX_FACTS
            && let Some(oracle) = &self.oracle
        {
            match oracle.extract_facts(user_input).await {
                Ok(found) => {
                    for fact in found {
                        push_fact(&mut facts, &fact);
                    }
                }
                Err(e) => warn!(error = %e, "Fact extraction failed, keeping local facts"),
            }
        }
        facts.truncate(MAX_FACTS);
        facts
    }
}

/// Third-person facts matched by the local patterns, de-duplicated.
pub fn local_facts(text: &str) -> Vec<String> {
    let mut facts = Vec::new();
    for pattern in FACT_PATTERNS.iter() {
        for caps in pattern.regex.captures_iter(text) {
            let value = caps.get(caps.len() - 1).map_or("", |m| m.as_str().trim());
            if value.chars().count() < 2 {
                continue;
            }
            push_fact(&mut facts, &(pattern.render)(&caps));
        }
    }
    facts
}

fn push_fact(facts: &mut Vec<String>, fact: &str) {
    let fact = fact.trim();
    if fact.is_empty() || facts.iter().any(|f| f.eq_ignore_ascii_case(fact)) {
        return;
    }
    facts.push(fact.to_string());
}

#[cfg(test)]
mod tests {
    use super::*;
    use mneme_llm::{Capability, ScriptedOracle};
    use mneme_memory::{HookConfig, MemoryKind, MemoryQuery, StoreConfig};

    fn updater(oracle: Option<Arc<ScriptedOracle>>) -> (MemoryUpdater, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::in_memory(StoreConfig::default()));
        let mut updater = MemoryUpdater::new(
            store.clone(),
            HookExtractor::new(HookConfig::default()),
            Summarizer::new(200),
        );
        if let Some(oracle) = oracle {
            updater = updater.with_oracle(oracle);
        }
        (updater, store)
    }

    #[test]
    fn test_local_facts() {
        let facts = local_facts(
            "My name is Ada. I live in London, and my favorite color is blue. I love hiking.",
        );
        assert_eq!(
            facts,
            vec![
                "User's favorite color is blue",
                "User loves hiking",
                "User's name is Ada",
                "User lives in London",
            ]
        );
    }

    #[test]
    fn test_local_facts_attributes() {
        let facts = local_facts("I'm a teacher. I have 2 cats. I am from Lisbon!");
        assert_eq!(
            facts,
            vec!["User is a teacher", "User has 2 cats", "User is from Lisbon"]
        );
        assert!(local_facts("Hello there").is_empty());
    }

    #[tokio::test]
    async fn test_record_interaction_stores_episode_and_facts() {
        let (updater, store) = updater(None);
        let report = updater
            .record_interaction(
                "My favorite color is blue",
                "Blue is a lovely color!",
                Some("conv-1"),
            )
            .await;

        assert!(!report.has_errors(), "{report}");
        let episodic_id = report.episodic_id.clone().unwrap();
        let episode = store.get(&episodic_id).unwrap().unwrap();
        assert_eq!(episode.kind, MemoryKind::Episodic);
        assert_eq!(
            episode.content,
            "User: My favorite color is blue\n\nAssistant: Blue is a lovely color!"
        );
        assert_eq!(episode.conversation_id.as_deref(), Some("conv-1"));
        assert!(episode.hooks.contains(&"blue".to_string()));

        assert_eq!(report.facts_stored.len(), 1);
        let facts = store
            .query(&MemoryQuery::non_episodic().with_hooks(["blue"]))
            .unwrap();
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].content, "User's favorite color is blue");
    }

    #[tokio::test]
    async fn test_oracle_tops_up_facts_to_limit() {
        let oracle = Arc::new(ScriptedOracle::new().with_facts([
            "User loves hiking",
            "User owns a bicycle",
            "User plays chess",
        ]));
        let (updater, _store) = updater(Some(oracle.clone()));
        let report = updater
            .record_interaction("I love hiking on weekends", "Sounds fun!", None)
            .await;

        assert_eq!(oracle.calls(Capability::ExtractFacts), 1);
        assert_eq!(report.facts_stored.len(), MAX_FACTS);
    }

    #[tokio::test]
    async fn test_oracle_failure_keeps_local_facts() {
        let oracle = Arc::new(ScriptedOracle::failing());
        let (updater, _store) = updater(Some(oracle));
        let report = updater
            .record_interaction("My name is Ada", "Nice to meet you, Ada.", None)
            .await;
        assert!(report.episodic_id.is_some());
        assert_eq!(report.facts_stored.len(), 1);
    }

    #[tokio::test]
    async fn test_reasoning_preamble_is_stripped() {
        let (updater, store) = updater(None);
        let report = updater
            .record_interaction(
                "Hi",
                "I'll respond warmly. \"Hello! How can I help you today?\"",
                None,
            )
            .await;
        let episode = store.get(report.episodic_id.as_deref().unwrap()).unwrap().unwrap();
        assert_eq!(
            episode.content,
            "User: Hi\n\nAssistant: Hello! How can I help you today?"
        );
    }

    #[tokio::test]
    async fn test_empty_interaction_is_skipped() {
        let (updater, store) = updater(None);
        let report = updater.record_interaction("", "reply", None).await;
        assert!(report.skipped);
        assert!(report.episodic_id.is_none());
        assert_eq!(store.count(MemoryKind::Episodic).unwrap(), 0);
    }

    #[test]
    fn test_report_display() {
        let report = UpdateReport {
            episodic_id: Some("episodic_1".into()),
            facts_stored: vec!["a".into(), "b".into()],
            errors: vec!["boom".into()],
            ..Default::default()
        };
        assert!(report.has_errors());
        assert_eq!(
            report.to_string(),
            "UpdateReport { episodic: episodic_1, facts: 2, rejected: 0, errors: 1 }"
        );
    }
}
