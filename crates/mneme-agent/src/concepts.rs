//! Concept indexing: fold memories into the concept graph and answer from it.
//!
//! Each memory's keywords become concepts. Every concept touched by a memory
//! gets a self tag, a `co-occurs` relation to its siblings, and a `summary`
//! trait entry `{text, memory_id, date, tone}` describing what the memory
//! says about it.

use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use mneme_llm::oracle::parse::{strip_reasoning_preamble, truncate_with_ellipsis};
use mneme_llm::{SharedOracle, Tone};
use mneme_memory::{ConceptManager, ConceptNode, HookExtractor, normalize_hooks, value_text};

use crate::config::ConceptConfig;
use crate::error::Result;
use crate::responder::APOLOGY;

/// Concepts taken from one memory.
const MAX_CONCEPTS: usize = 10;

/// Fallback concept summary length.
const FALLBACK_SUMMARY_CHARS: usize = 200;

const RELATION_CO_OCCURS: &str = "co-occurs";

/// Maintains the concept graph and answers queries from it.
#[derive(Clone)]
pub struct ConceptIndexer {
    manager: Arc<ConceptManager>,
    extractor: HookExtractor,
    oracle: SharedOracle,
    config: ConceptConfig,
}

impl ConceptIndexer {
    pub fn new(
        manager: Arc<ConceptManager>,
        extractor: HookExtractor,
        oracle: SharedOracle,
        config: ConceptConfig,
    ) -> Self {
        Self {
            manager,
            extractor,
            oracle,
            config,
        }
    }

    pub fn manager(&self) -> &ConceptManager {
        &self.manager
    }

    /// Fold `text` into the graph. Returns the names of the concepts touched.
    pub async fn process_memory(&self, text: &str, memory_id: Option<&str>) -> Result<Vec<String>> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Vec::new());
        }
        let concepts = self.keywords(text).await;
        let now = Utc::now();

        let mut updated = Vec::with_capacity(concepts.len());
        for concept in &concepts {
            let mut node = self.manager.get_or_create(concept)?;
            node.add_tag(concept);
            for other in concepts.iter().filter(|other| *other != concept) {
                node.relate_to(other, RELATION_CO_OCCURS);
            }

            let summary = self.describe(concept, text).await;
            let tone = self.tone(&summary).await;
            node.add_trait(
                "summary",
                json!({
                    "text": summary,
                    "memory_id": memory_id,
                    "date": now.to_rfc3339(),
                    "tone": tone.as_str(),
                }),
            );
            if let Some(id) = memory_id {
                node.link_memory(id);
            }
            node.add_trait("last_updated_memory", now.to_rfc3339());

            self.manager.save(&mut node)?;
            updated.push(node.name().to_string());
        }

        info!(count = updated.len(), concepts = ?updated, "Indexed memory into concepts");
        Ok(updated)
    }

    /// Nodes matching any keyword of `query`, de-duplicated by name.
    pub async fn retrieve_relevant_concepts(&self, query: &str) -> Result<Vec<ConceptNode>> {
        let mut seen = HashSet::new();
        let mut nodes = Vec::new();
        for keyword in self.keywords(query).await {
            for node in self.manager.search(&keyword)? {
                if seen.insert(node.name().to_string()) {
                    nodes.push(node);
                }
            }
        }
        debug!(count = nodes.len(), "Retrieved relevant concepts");
        Ok(nodes)
    }

    pub fn build_context(&self, nodes: &[ConceptNode]) -> String {
        self.build_context_at(nodes, Utc::now())
    }

    /// Context text with nodes split by freshness relative to `now`.
    pub fn build_context_at(&self, nodes: &[ConceptNode], now: DateTime<Utc>) -> String {
        let threshold = now - self.config.freshness();
        let (fresh, settled): (Vec<_>, Vec<_>) =
            nodes.iter().partition(|node| node.last_updated() > threshold);

        let mut parts = Vec::new();
        if !settled.is_empty() {
            let sections: Vec<String> = settled.iter().map(|n| concept_section(n)).collect();
            parts.push(format!("MEMORY CONTEXT:\n{}", sections.join("\n\n")));
        }
        if !fresh.is_empty() {
            let sections: Vec<String> = fresh.iter().map(|n| concept_section(n)).collect();
            parts.push(format!(
                "NEW INFORMATION (recently learned):\n{}",
                sections.join("\n\n")
            ));
        }
        parts.join("\n\n")
    }

    /// Answer `query` from the concept graph alone.
    pub async fn generate_response(&self, query: &str) -> String {
        let nodes = match self.retrieve_relevant_concepts(query).await {
            Ok(nodes) => nodes,
            Err(e) => {
                warn!(error = %e, "Concept retrieval failed, answering without context");
                Vec::new()
            }
        };
        let context = self.build_context(&nodes);
        match self.oracle.generate_response(query, &context).await {
            Ok(reply) if !reply.trim().is_empty() => strip_reasoning_preamble(&reply),
            Ok(_) => APOLOGY.to_string(),
            Err(e) => {
                warn!(error = %e, "Concept response generation failed");
                APOLOGY.to_string()
            }
        }
    }

    async fn keywords(&self, text: &str) -> Vec<String> {
        let keywords = match self.oracle.extract_keywords_themes_sentiment(text).await {
            Ok(analysis) if !analysis.keywords.is_empty() => normalize_hooks(&analysis.keywords),
            Ok(_) => self.extractor.local_hooks(text),
            Err(e) => {
                warn!(error = %e, "Keyword extraction failed, using local hooks");
                self.extractor.local_hooks(text)
            }
        };
        keywords.into_iter().take(MAX_CONCEPTS).collect()
    }

    async fn describe(&self, concept: &str, text: &str) -> String {
        match self.oracle.describe_concept(concept, text).await {
            Ok(summary) if !summary.trim().is_empty() => summary.trim().to_string(),
            Ok(_) => truncate_with_ellipsis(text, FALLBACK_SUMMARY_CHARS),
            Err(e) => {
                warn!(concept = %concept, error = %e, "Concept summary failed, using source text");
                truncate_with_ellipsis(text, FALLBACK_SUMMARY_CHARS)
            }
        }
    }

    async fn tone(&self, statement: &str) -> Tone {
        self.oracle.classify_tone(statement).await.unwrap_or_else(|e| {
            debug!(error = %e, "Tone classification failed");
            Tone::Unclear
        })
    }
}

/// One node rendered with its summaries grouped by tone.
fn concept_section(node: &ConceptNode) -> String {
    let mut literal = Vec::new();
    let mut metaphorical = Vec::new();
    let mut unclear = Vec::new();
    for entry in node.trait_values("summary") {
        let (text, tone) = summary_entry(entry);
        match tone {
            Some(Tone::Literal) => literal.push(text),
            Some(Tone::Metaphorical) => metaphorical.push(text),
            _ => unclear.push(text),
        }
    }

    let mut section = format!(
        "Concept: {} (Type: {})\nTags: {}\n",
        node.name(),
        node.concept_type(),
        node.tags().join(", ")
    );
    for (heading, items) in [
        ("Facts (literal)", literal),
        ("Theories (metaphorical)", metaphorical),
        ("Disputed/unclear", unclear),
    ] {
        if !items.is_empty() {
            section.push_str(&format!("{heading}:\n- {}\n", items.join("\n- ")));
        }
    }
    section
}

/// Text and tone of a summary trait value. Plain strings have no tone.
fn summary_entry(value: &Value) -> (String, Option<Tone>) {
    match value {
        Value::Object(map) => {
            let text = map.get("text").map(value_text).unwrap_or_default();
            let tone = map
                .get("tone")
                .and_then(Value::as_str)
                .and_then(Tone::from_label);
            (text, tone)
        }
        other => (value_text(other), None),
    }
}
