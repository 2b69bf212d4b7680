//! Prompt analysis: what a user message is about and whether it asks
//! about the past.

use chrono::{NaiveDate, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use tracing::{debug, warn};

use mneme_llm::{Sentiment, SharedOracle, TextAnalysis};
use mneme_memory::{QueryHints, contains_phrase, detect_temporal};

/// Words that mark a message as asking about earlier turns.
const MEMORY_KEYWORDS: &[&str] = &[
    "remember",
    "recall",
    "memory",
    "forget",
    "remembered",
    "mentioned",
    "said",
    "told",
    "talked about",
    "discussed",
    "previous",
    "earlier",
    "before",
    "last time",
];

static TALK_ABOUT: LazyLock<[Regex; 3]> = LazyLock::new(|| {
    [
        r"(?i)what did (?:we|you|i) (?:talk|discuss|say|mention) about",
        r"(?i)what (?:was|were) (?:we|you|i) (?:talking|discussing|saying|mentioning) about",
        r"(?i)what have (?:we|you|i) (?:talked|discussed|said|mentioned) about",
    ]
    .map(|p| Regex::new(p).expect("valid regex"))
});

/// A user message with everything retrieval needs to know about it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedPrompt {
    pub text: String,
    pub keywords: Vec<String>,
    pub themes: Vec<String>,
    pub sentiment: Sentiment,
    /// Raw date mentions.
    pub dates: Vec<String>,
    pub is_memory_query: bool,
    /// The calendar day the message refers to, if one resolves.
    pub date_reference: Option<NaiveDate>,
}

impl ProcessedPrompt {
    /// Keywords and themes in the form the relevancer folds into its hooks.
    pub fn hints(&self) -> QueryHints {
        QueryHints {
            keywords: self.keywords.clone(),
            themes: self.themes.clone(),
        }
    }
}

/// Turns raw user input into a [`ProcessedPrompt`].
#[derive(Clone, Default)]
pub struct PromptAnalyzer {
    oracle: Option<SharedOracle>,
}

impl PromptAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_oracle(mut self, oracle: SharedOracle) -> Self {
        self.oracle = Some(oracle);
        self
    }

    pub async fn analyze(&self, text: &str) -> ProcessedPrompt {
        self.analyze_on(text, Utc::now().date_naive()).await
    }

    /// Analyze relative to a fixed `today`.
    pub async fn analyze_on(&self, text: &str, today: NaiveDate) -> ProcessedPrompt {
        let analysis = self.extract(text).await;
        let temporal = detect_temporal(text, today);

        let mut prompt = ProcessedPrompt {
            text: text.to_string(),
            keywords: analysis.keywords,
            themes: analysis.themes,
            sentiment: analysis.sentiment,
            dates: temporal.mentions,
            is_memory_query: false,
            date_reference: temporal.specific_date,
        };

        let lower = text.to_lowercase();
        if MEMORY_KEYWORDS.iter().any(|k| contains_phrase(&lower, k)) {
            prompt.is_memory_query = true;
            push_unique(&mut prompt.keywords, "memory");
            push_unique(&mut prompt.keywords, "recall");
        }
        if TALK_ABOUT.iter().any(|re| re.is_match(text)) {
            prompt.is_memory_query = true;
            push_unique(&mut prompt.keywords, "conversation history");
            push_unique(&mut prompt.themes, "past conversations");
        }

        debug!(
            keywords = prompt.keywords.len(),
            themes = prompt.themes.len(),
            memory_query = prompt.is_memory_query,
            "Analyzed prompt"
        );
        prompt
    }

    async fn extract(&self, text: &str) -> TextAnalysis {
        if text.trim().is_empty() {
            return TextAnalysis::default();
        }
        let Some(oracle) = &self.oracle else {
            return TextAnalysis::default();
        };
        match oracle.extract_keywords_themes_sentiment(text).await {
            Ok(analysis) => analysis,
            Err(e) => {
                warn!(error = %e, "Keyword extraction failed, continuing without it");
                TextAnalysis::default()
            }
        }
    }
}

fn push_unique(items: &mut Vec<String>, value: &str) {
    if !items.iter().any(|i| i == value) {
        items.push(value.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mneme_llm::{Capability, ScriptedOracle};
    use std::sync::Arc;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    #[tokio::test]
    async fn test_analyze_uses_oracle_extraction() {
        let oracle = Arc::new(ScriptedOracle::new().with_analysis(TextAnalysis {
            keywords: vec!["pizza".into()],
            themes: vec!["food".into()],
            sentiment: Sentiment::Positive,
        }));
        let analyzer = PromptAnalyzer::new().with_oracle(oracle);

        let prompt = analyzer.analyze_on("I love pizza", today()).await;
        assert_eq!(prompt.keywords, vec!["pizza"]);
        assert_eq!(prompt.themes, vec!["food"]);
        assert_eq!(prompt.sentiment, Sentiment::Positive);
        assert!(!prompt.is_memory_query);
        assert_eq!(prompt.hints().keywords, vec!["pizza"]);
    }

    #[tokio::test]
    async fn test_oracle_failure_falls_back_to_empty() {
        let analyzer = PromptAnalyzer::new().with_oracle(Arc::new(ScriptedOracle::failing()));
        let prompt = analyzer.analyze_on("Tell me a joke", today()).await;
        assert!(prompt.keywords.is_empty());
        assert_eq!(prompt.sentiment, Sentiment::Neutral);
    }

    #[tokio::test]
    async fn test_empty_prompt_skips_oracle() {
        let oracle = Arc::new(ScriptedOracle::failing());
        let analyzer = PromptAnalyzer::new().with_oracle(oracle.clone());
        let prompt = analyzer.analyze_on("   ", today()).await;
        assert_eq!(oracle.calls(Capability::Extract), 0);
        assert!(prompt.keywords.is_empty());
    }

    #[tokio::test]
    async fn test_memory_keywords_mark_memory_query() {
        let prompt = PromptAnalyzer::new()
            .analyze_on("Do you remember my favorite color?", today())
            .await;
        assert!(prompt.is_memory_query);
        assert_eq!(prompt.keywords, vec!["memory", "recall"]);
    }

    #[tokio::test]
    async fn test_talk_about_question() {
        let prompt = PromptAnalyzer::new()
            .analyze_on("What did we talk about on March 3, 2024?", today())
            .await;
        assert!(prompt.is_memory_query);
        assert!(prompt.keywords.contains(&"conversation history".to_string()));
        assert_eq!(prompt.themes, vec!["past conversations"]);
        assert_eq!(prompt.date_reference, NaiveDate::from_ymd_opt(2024, 3, 3));
        assert!(!prompt.dates.is_empty());
    }

    #[tokio::test]
    async fn test_keyword_match_is_whole_word() {
        let prompt = PromptAnalyzer::new()
            .analyze_on("The beforehand preparations were saidly done", today())
            .await;
        assert!(!prompt.is_memory_query);
    }
}
