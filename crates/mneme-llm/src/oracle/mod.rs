//! The text oracle: every natural-language capability the memory core
//! delegates to a model.
//!
//! Implementations return `Err` for transport failures *and* for replies
//! that cannot be interpreted; each call site owns its local fallback.

mod llm;
pub mod parse;
#[cfg(any(test, feature = "testing"))]
mod scripted;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::Result;

pub use llm::{LlmOracle, OracleConfig};
#[cfg(any(test, feature = "testing"))]
pub use scripted::{Capability, ScriptedOracle};

// ─────────────────────────────────────────────────────────────────────────────
// Oracle Value Types
// ─────────────────────────────────────────────────────────────────────────────

/// Overall emotional tone of a text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    #[default]
    Neutral,
    Mixed,
}

impl Sentiment {
    /// Lenient parse; anything unrecognised is neutral.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "positive" => Sentiment::Positive,
            "negative" => Sentiment::Negative,
            "mixed" => Sentiment::Mixed,
            _ => Sentiment::Neutral,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Negative => "negative",
            Sentiment::Neutral => "neutral",
            Sentiment::Mixed => "mixed",
        }
    }
}

/// Keywords, themes and sentiment extracted from a text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextAnalysis {
    pub keywords: Vec<String>,
    pub themes: Vec<String>,
    pub sentiment: Sentiment,
}

/// Rhetorical mode of a statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Literal,
    Metaphorical,
    Hypothetical,
    Rhetorical,
    Sarcastic,
    #[default]
    Unclear,
}

impl Tone {
    pub const ALL: [Tone; 6] = [
        Tone::Literal,
        Tone::Metaphorical,
        Tone::Hypothetical,
        Tone::Rhetorical,
        Tone::Sarcastic,
        Tone::Unclear,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tone::Literal => "literal",
            Tone::Metaphorical => "metaphorical",
            Tone::Hypothetical => "hypothetical",
            Tone::Rhetorical => "rhetorical",
            Tone::Sarcastic => "sarcastic",
            Tone::Unclear => "unclear",
        }
    }

    /// Exact (case-insensitive) match against the allowed labels.
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim().to_lowercase();
        Tone::ALL.into_iter().find(|t| t.as_str() == label)
    }
}

impl std::fmt::Display for Tone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Text Oracle Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Natural-language capabilities used by the memory core.
#[async_trait]
pub trait TextOracle: Send + Sync {
    /// Summarize `text` in at most `max_length` characters.
    async fn summarize(&self, text: &str, max_length: usize) -> Result<String>;

    /// Extract keywords, themes and sentiment.
    async fn extract_keywords_themes_sentiment(&self, text: &str) -> Result<TextAnalysis>;

    /// Propose up to `max_hooks` short index tags, given hooks already found locally.
    async fn propose_hooks(
        &self,
        text: &str,
        existing_hooks: &[String],
        max_hooks: usize,
    ) -> Result<Vec<String>>;

    /// Classify the rhetorical tone of a statement.
    async fn classify_tone(&self, text: &str) -> Result<Tone>;

    /// Order candidates by relevance to `query`, returning 1-based indices.
    ///
    /// Indices may be incomplete, duplicated or out of range; callers
    /// sanitize them.
    async fn rank_by_relevance(&self, query: &str, candidates: &[String]) -> Result<Vec<usize>>;

    /// Answer `query` using `context`.
    async fn generate_response(&self, query: &str, context: &str) -> Result<String>;

    /// Extract zero to three standalone facts worth remembering.
    async fn extract_facts(&self, text: &str) -> Result<Vec<String>>;

    /// Summarize what `text` reveals about `concept`.
    async fn describe_concept(&self, concept: &str, text: &str) -> Result<String>;
}

/// An oracle that can be shared across components.
pub type SharedOracle = Arc<dyn TextOracle>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentiment_parse() {
        assert_eq!(Sentiment::parse("Positive"), Sentiment::Positive);
        assert_eq!(Sentiment::parse(" mixed "), Sentiment::Mixed);
        assert_eq!(Sentiment::parse("ecstatic"), Sentiment::Neutral);
    }

    #[test]
    fn test_tone_labels() {
        assert_eq!(Tone::from_label("Sarcastic"), Some(Tone::Sarcastic));
        assert_eq!(Tone::from_label("ironic"), None);
        assert_eq!(Tone::default(), Tone::Unclear);
        assert_eq!(Tone::Metaphorical.to_string(), "metaphorical");
    }

    #[test]
    fn test_tone_serde_lowercase() {
        let json = serde_json::to_string(&Tone::Hypothetical).unwrap();
        assert_eq!(json, "\"hypothetical\"");
    }
}
