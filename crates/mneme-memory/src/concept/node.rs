//! A single concept in the concept graph.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::types::lenient_timestamp;

/// Type assigned to nodes nobody has classified.
pub const UNKNOWN_TYPE: &str = "unknown";

fn unknown_type() -> String {
    UNKNOWN_TYPE.to_string()
}

/// One durable record per concept name.
///
/// Mutators refresh `last_updated` but never persist; call
/// [`ConceptManager::save`](super::ConceptManager::save) afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConceptNode {
    name: String,
    #[serde(rename = "type", default = "unknown_type")]
    concept_type: String,
    #[serde(default)]
    traits: BTreeMap<String, Vec<Value>>,
    #[serde(default)]
    related_concepts: BTreeMap<String, String>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    linked_memories: Vec<String>,
    #[serde(deserialize_with = "lenient_timestamp")]
    last_updated: DateTime<Utc>,
    #[serde(flatten)]
    extra: serde_json::Map<String, Value>,
}

impl ConceptNode {
    /// A fresh node. `name` must already be normalized.
    pub(crate) fn new(name: String) -> Self {
        Self {
            name,
            concept_type: unknown_type(),
            traits: BTreeMap::new(),
            related_concepts: BTreeMap::new(),
            tags: Vec::new(),
            linked_memories: Vec::new(),
            last_updated: Utc::now(),
            extra: serde_json::Map::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn concept_type(&self) -> &str {
        &self.concept_type
    }

    pub fn traits(&self) -> &BTreeMap<String, Vec<Value>> {
        &self.traits
    }

    /// Values of one trait, empty if absent.
    pub fn trait_values(&self, key: &str) -> &[Value] {
        self.traits.get(key).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn related_concepts(&self) -> &BTreeMap<String, String> {
        &self.related_concepts
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn linked_memories(&self) -> &[String] {
        &self.linked_memories
    }

    pub fn last_updated(&self) -> DateTime<Utc> {
        self.last_updated
    }

    pub(crate) fn set_name(&mut self, name: String) {
        self.name = name;
    }

    pub(crate) fn touch(&mut self) {
        self.last_updated = Utc::now();
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Mutators
    // ─────────────────────────────────────────────────────────────────────────

    /// Append a trait value unless the key already holds an identical one.
    pub fn add_trait(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let value = value.into();
        let values = self.traits.entry(key.into()).or_default();
        if !values.contains(&value) {
            values.push(value);
        }
        self.touch();
    }

    /// Add a lowercased, trimmed tag. Blank and duplicate tags are ignored.
    pub fn add_tag(&mut self, tag: &str) {
        let tag = tag.trim().to_lowercase();
        if !tag.is_empty() && !self.tags.contains(&tag) {
            self.tags.push(tag);
        }
        self.touch();
    }

    /// Set the relation to another concept. The last label written wins.
    pub fn relate_to(&mut self, other: &str, relation: &str) {
        let other = other.trim().to_lowercase();
        if !other.is_empty() {
            self.related_concepts
                .insert(other, relation.trim().to_lowercase());
        }
        self.touch();
    }

    /// Link a source memory id.
    pub fn link_memory(&mut self, memory_id: &str) {
        if !self.linked_memories.iter().any(|m| m == memory_id) {
            self.linked_memories.push(memory_id.to_string());
        }
        self.touch();
    }

    pub fn set_type(&mut self, concept_type: &str) {
        self.concept_type = concept_type.trim().to_lowercase();
        self.touch();
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Merge and Search
    // ─────────────────────────────────────────────────────────────────────────

    /// Fold `other` into this node.
    ///
    /// | field     | policy                              |
    /// |-----------|-------------------------------------|
    /// | traits    | per-key union, exact-match de-dup   |
    /// | tags      | union                               |
    /// | relations | this node wins on conflict          |
    /// | memories  | union                               |
    /// | type      | this node's, unless it is `unknown` |
    pub fn absorb(&mut self, other: &ConceptNode) {
        for (key, values) in &other.traits {
            for value in values {
                self.add_trait(key.clone(), value.clone());
            }
        }
        for tag in &other.tags {
            self.add_tag(tag);
        }
        for (target, relation) in &other.related_concepts {
            if !self.related_concepts.contains_key(target) {
                self.relate_to(target, relation);
            }
        }
        for memory_id in &other.linked_memories {
            self.link_memory(memory_id);
        }
        if self.concept_type == UNKNOWN_TYPE && other.concept_type != UNKNOWN_TYPE {
            self.set_type(&other.concept_type);
        }
        self.touch();
    }

    /// Case-insensitive substring match on name, tags, trait keys and values.
    pub fn matches(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        if self.name.contains(&query) || self.tags.iter().any(|t| t.contains(&query)) {
            return true;
        }
        self.traits.iter().any(|(key, values)| {
            key.to_lowercase().contains(&query)
                || values
                    .iter()
                    .any(|v| value_text(v).to_lowercase().contains(&query))
        })
    }
}

/// Strings as themselves, anything else as compact JSON.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node(name: &str) -> ConceptNode {
        ConceptNode::new(name.to_string())
    }

    #[test]
    fn test_defaults() {
        let n = node("blue");
        assert_eq!(n.concept_type(), "unknown");
        assert!(n.traits().is_empty());
        assert!(n.tags().is_empty());
    }

    #[test]
    fn test_add_trait_dedups_exact_values() {
        let mut n = node("blue");
        n.add_trait("favorite_color", "blue");
        n.add_trait("favorite_color", "blue");
        n.add_trait("favorite_color", "Blue");
        assert_eq!(n.trait_values("favorite_color"), &[json!("blue"), json!("Blue")]);
        assert!(n.trait_values("missing").is_empty());
    }

    #[test]
    fn test_tags_relations_links_type() {
        let mut n = node("tea");
        n.add_tag("  Drink ");
        n.add_tag("drink");
        n.add_tag("   ");
        assert_eq!(n.tags(), &["drink".to_string()]);

        n.relate_to(" Coffee ", "Alternative");
        n.relate_to("coffee", "rival");
        assert_eq!(n.related_concepts()["coffee"], "rival");
        assert_eq!(n.related_concepts().len(), 1);

        n.link_memory("episodic_1");
        n.link_memory("episodic_1");
        assert_eq!(n.linked_memories().len(), 1);

        n.set_type(" Beverage ");
        assert_eq!(n.concept_type(), "beverage");
    }

    #[test]
    fn test_mutation_refreshes_timestamp() {
        let mut n = node("x");
        let before = n.last_updated();
        std::thread::sleep(std::time::Duration::from_millis(5));
        n.add_tag("y");
        assert!(n.last_updated() > before);
    }

    #[test]
    fn test_absorb_policy() {
        let mut a = node("a");
        a.add_trait("color", "red");
        a.relate_to("x", "likes");
        a.add_tag("shared");

        let mut b = node("b");
        b.add_trait("color", "red");
        b.add_trait("color", "blue");
        b.add_trait("size", "big");
        b.relate_to("x", "hates");
        b.relate_to("y", "knows");
        b.add_tag("shared");
        b.add_tag("extra");
        b.link_memory("m1");
        b.set_type("person");

        a.absorb(&b);
        assert_eq!(a.trait_values("color"), &[json!("red"), json!("blue")]);
        assert_eq!(a.trait_values("size"), &[json!("big")]);
        assert_eq!(a.related_concepts()["x"], "likes");
        assert_eq!(a.related_concepts()["y"], "knows");
        assert_eq!(a.tags(), &["shared".to_string(), "extra".to_string()]);
        assert_eq!(a.linked_memories(), &["m1".to_string()]);
        assert_eq!(a.concept_type(), "person");

        let mut typed = node("c");
        typed.set_type("place");
        typed.absorb(&b);
        assert_eq!(typed.concept_type(), "place");
    }

    #[test]
    fn test_matches() {
        let mut n = node("blue");
        n.add_trait("favorite_color", "blue");
        n.add_trait("summary", json!({"text": "Sky Colored", "tone": "literal"}));
        n.add_tag("preference");

        assert!(n.matches("favorite"));
        assert!(n.matches("PREF"));
        assert!(n.matches("lu"));
        assert!(n.matches("sky colored"));
        assert!(!n.matches("green"));
    }

    #[test]
    fn test_deserialize_legacy_document() {
        let n: ConceptNode = serde_json::from_str(
            r#"{"name":"jazz","traits":{"summary":["{\"text\": \"x\"}"]},
                "last_updated":"2025-04-13T10:00:00.5","origin":"import"}"#,
        )
        .unwrap();
        assert_eq!(n.concept_type(), "unknown");
        assert_eq!(n.trait_values("summary").len(), 1);
        assert_eq!(serde_json::to_value(&n).unwrap()["origin"], "import");
    }
}
