//! Hook extraction: short index tags derived from free text.
//!
//! Local heuristics run first (word frequency, phrase frequency, naive
//! capitalized-word entities). The oracle is consulted only when the local
//! set falls short of the cap, and its failure never surfaces as an error.

use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;
use tracing::{debug, warn};

use mneme_llm::SharedOracle;

use crate::validation::normalize_hooks;

static NON_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s-]").expect("valid regex"));
static CAPITALIZED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Z][a-z]+\b").expect("valid regex"));
static CAPITALIZED_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Z][a-z]+(?:\s+[A-Z][a-z]+)+\b").expect("valid regex"));
static CAPITALIZED_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Z][a-z]{2,}\b").expect("valid regex"));

const TOP_WORDS: usize = 10;
const TOP_PHRASES: usize = 10;
const MAX_ENTITIES: usize = 5;

/// Common English words that make poor index terms.
pub const STOPWORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "also", "am", "an", "and", "any",
    "are", "aren't", "as", "at", "be", "because", "been", "before", "being", "below", "between",
    "both", "but", "by", "can", "could", "did", "do", "does", "doing", "don't", "down", "during",
    "each", "few", "for", "from", "further", "had", "has", "have", "having", "he", "her", "here",
    "hers", "herself", "him", "himself", "his", "how", "i", "if", "in", "into", "is", "it",
    "it's", "its", "itself", "just", "let", "me", "more", "most", "my", "myself", "no", "nor",
    "not", "now", "of", "off", "on", "once", "only", "or", "other", "our", "ours", "ourselves",
    "out", "over", "own", "really", "same", "she", "should", "so", "some", "such", "than",
    "that", "the", "their", "theirs", "them", "themselves", "then", "there", "these", "they",
    "this", "those", "through", "to", "too", "under", "until", "up", "user", "assistant",
    "very", "was", "we", "were", "what", "when", "where", "which", "while", "who", "whom",
    "why", "will", "with", "would", "you", "your", "yours", "yourself", "yourselves",
];

fn is_stopword(word: &str) -> bool {
    STOPWORDS.contains(&word)
}

/// Keyword groups that imply a category hook.
const CATEGORIES: &[(&str, &[&str])] = &[
    ("personal", &["my", "i am", "i'm", "my name", "myself", "i have", "i've"]),
    ("question", &["what", "how", "why", "when", "where", "who", "can you", "could you"]),
    ("preference", &["like", "prefer", "favorite", "enjoy", "love", "hate", "dislike"]),
    ("food", &["eat", "food", "dish", "meal", "recipe", "cook", "bake", "restaurant"]),
    ("technology", &["computer", "software", "hardware", "app", "device", "phone", "laptop", "code"]),
    ("opinion", &["think", "believe", "opinion", "perspective", "view", "consider"]),
    ("place", &["city", "country", "location", "visit", "travel", "place", "region", "area"]),
];

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Limits applied to every extracted hook set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HookConfig {
    pub max_hooks: usize,
    pub min_length: usize,
    pub max_length: usize,
}

impl Default for HookConfig {
    fn default() -> Self {
        Self {
            max_hooks: 10,
            min_length: 2,
            max_length: 30,
        }
    }
}

impl HookConfig {
    /// Normalize, de-duplicate and drop hooks outside the length bounds.
    pub fn filter<I, S>(&self, hooks: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        normalize_hooks(hooks)
            .into_iter()
            .filter(|h| {
                let len = h.chars().count();
                len >= self.min_length && len <= self.max_length
            })
            .collect()
    }

    /// [`HookConfig::filter`], then truncate to the cap.
    pub fn cap<I, S>(&self, hooks: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut hooks = self.filter(hooks);
        hooks.truncate(self.max_hooks);
        hooks
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Extractor
// ─────────────────────────────────────────────────────────────────────────────

/// Derives hooks from text, optionally topped up by the oracle.
#[derive(Clone)]
pub struct HookExtractor {
    config: HookConfig,
    oracle: Option<SharedOracle>,
}

impl std::fmt::Debug for HookExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookExtractor")
            .field("config", &self.config)
            .field("oracle", &self.oracle.is_some())
            .finish()
    }
}

impl HookExtractor {
    /// A local-only extractor.
    pub fn new(config: HookConfig) -> Self {
        Self {
            config,
            oracle: None,
        }
    }

    pub fn with_oracle(mut self, oracle: SharedOracle) -> Self {
        self.oracle = Some(oracle);
        self
    }

    pub fn config(&self) -> &HookConfig {
        &self.config
    }

    /// Extract at most `max_hooks` hooks from `text`.
    ///
    /// `existing_hooks` is passed to the oracle as context only.
    pub async fn extract(&self, text: &str, existing_hooks: &[String]) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let local = self.config.filter(local_candidates(text));
        if local.len() >= self.config.max_hooks {
            debug!(count = local.len(), "Local hooks fill the cap, skipping oracle");
            return local.into_iter().take(self.config.max_hooks).collect();
        }

        let Some(oracle) = &self.oracle else {
            return local;
        };

        match oracle
            .propose_hooks(text, existing_hooks, self.config.max_hooks)
            .await
        {
            Ok(proposed) => {
                let merged = self.config.cap(local.iter().chain(proposed.iter()));
                debug!(
                    local = local.len(),
                    proposed = proposed.len(),
                    merged = merged.len(),
                    "Merged oracle hooks"
                );
                merged
            }
            Err(e) => {
                warn!(error = %e, "Hook oracle failed, using local hooks");
                local
            }
        }
    }

    /// Local heuristics only, filtered and capped.
    pub fn local_hooks(&self, text: &str) -> Vec<String> {
        self.config.cap(local_candidates(text))
    }
}

/// Unfiltered local candidates in priority order: words, phrases, entities.
fn local_candidates(text: &str) -> Vec<String> {
    let normalized = NON_WORD.replace_all(&text.to_lowercase(), " ").into_owned();
    let words: Vec<&str> = normalized.split_whitespace().collect();

    let single = top_by_frequency(
        words
            .iter()
            .filter(|w| w.chars().count() > 2 && !is_stopword(w))
            .map(|w| w.to_string()),
        TOP_WORDS,
    );

    let mut phrases = Vec::new();
    for i in 0..words.len().saturating_sub(1) {
        let first = words[i];
        if is_stopword(first) || first.chars().count() <= 2 {
            continue;
        }
        phrases.push(format!("{first} {}", words[i + 1]));
        if i + 2 < words.len() {
            phrases.push(format!("{first} {} {}", words[i + 1], words[i + 2]));
        }
    }
    let phrases = top_by_frequency(phrases, TOP_PHRASES);

    let entities = CAPITALIZED
        .find_iter(text)
        .map(|m| m.as_str())
        .filter(|e| e.chars().count() > 2)
        .take(MAX_ENTITIES)
        .map(str::to_lowercase);

    single.into_iter().chain(phrases).chain(entities).collect()
}

/// Most frequent items first; ties keep first-seen order.
fn top_by_frequency<I>(items: I, limit: usize) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut order: Vec<String> = Vec::new();
    for item in items {
        let count = counts.entry(item.clone()).or_insert(0);
        if *count == 0 {
            order.push(item);
        }
        *count += 1;
    }
    order.sort_by_key(|item| std::cmp::Reverse(counts[item]));
    order.truncate(limit);
    order
}

// ─────────────────────────────────────────────────────────────────────────────
// Category and Entity Helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Category hooks whose trigger words appear in `text` (whole words only).
pub fn category_hooks(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    CATEGORIES
        .iter()
        .filter(|(_, keywords)| keywords.iter().any(|k| contains_phrase(&lower, k)))
        .map(|(category, _)| category.to_string())
        .collect()
}

/// Whole-word containment of `phrase` in already-lowercased `haystack`.
pub fn contains_phrase(haystack: &str, phrase: &str) -> bool {
    let is_word = |c: char| c.is_alphanumeric() || c == '\'';
    haystack.match_indices(phrase).any(|(start, _)| {
        let end = start + phrase.len();
        let before_ok = haystack[..start].chars().next_back().is_none_or(|c| !is_word(c));
        let after_ok = haystack[end..].chars().next().is_none_or(|c| !is_word(c));
        before_ok && after_ok
    })
}

/// Naive named-entity guesses: capitalized runs, then capitalized words of
/// three or more letters. Lowercased, de-duplicated, first-seen order.
pub fn extract_entities(text: &str) -> Vec<String> {
    let runs = CAPITALIZED_RUN.find_iter(text).map(|m| m.as_str());
    let words = CAPITALIZED_WORD.find_iter(text).map(|m| m.as_str());
    normalize_hooks(runs.chain(words).map(|e| {
        e.split_whitespace().collect::<Vec<_>>().join(" ")
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mneme_llm::{Capability, ScriptedOracle};
    use std::sync::Arc;

    fn extractor() -> HookExtractor {
        HookExtractor::new(HookConfig::default())
    }

    #[test]
    fn test_local_hooks_frequency_and_entities() {
        let hooks = extractor().local_hooks(
            "Pizza is great. I love pizza with basil. Naples makes the best pizza.",
        );
        assert_eq!(hooks[0], "pizza");
        assert!(hooks.contains(&"naples".to_string()));
        assert!(hooks.iter().all(|h| h.len() >= 2 && h.len() <= 30));
        assert!(hooks.len() <= 10);
        assert!(!hooks.contains(&"the".to_string()));
    }

    #[test]
    fn test_local_hooks_strip_punctuation_keep_hyphens() {
        let hooks = extractor().local_hooks("state-of-the-art! compilers? compilers.");
        assert!(hooks.contains(&"state-of-the-art".to_string()));
        assert!(hooks.contains(&"compilers".to_string()));
    }

    #[test]
    fn test_length_bounds() {
        let config = HookConfig {
            max_hooks: 10,
            min_length: 4,
            max_length: 8,
        };
        let hooks = config.filter(["abc", "abcd", "abcdefgh", "abcdefghi", "ABCD"]);
        assert_eq!(hooks, vec!["abcd", "abcdefgh"]);
    }

    #[tokio::test]
    async fn test_oracle_skipped_when_local_fills_cap() {
        let oracle = Arc::new(ScriptedOracle::new().with_hooks(["never"]));
        let extractor = HookExtractor::new(HookConfig {
            max_hooks: 3,
            ..Default::default()
        })
        .with_oracle(oracle.clone());

        let hooks = extractor
            .extract("rust compilers optimize rust programs quickly", &[])
            .await;
        assert_eq!(hooks.len(), 3);
        assert_eq!(oracle.calls(Capability::ProposeHooks), 0);
    }

    #[tokio::test]
    async fn test_oracle_hooks_merged_and_capped() {
        let oracle = Arc::new(ScriptedOracle::new().with_hooks(["Favorite Color", "blue", ""]));
        let extractor = HookExtractor::new(HookConfig::default()).with_oracle(oracle.clone());

        let hooks = extractor.extract("Blue.", &[]).await;
        assert_eq!(hooks, vec!["blue", "favorite color"]);
        assert_eq!(oracle.calls(Capability::ProposeHooks), 1);
    }

    #[tokio::test]
    async fn test_full_oracle_proposal_keeps_local_hooks() {
        let oracle = Arc::new(ScriptedOracle::new().with_hooks(["alpha", "beta", "gamma"]));
        let extractor = HookExtractor::new(HookConfig {
            max_hooks: 3,
            ..Default::default()
        })
        .with_oracle(oracle);

        let hooks = extractor.extract("Blue.", &[]).await;
        assert_eq!(hooks, vec!["blue", "alpha", "beta"]);
    }

    #[tokio::test]
    async fn test_oracle_failure_degrades_to_local() {
        let oracle = Arc::new(ScriptedOracle::failing());
        let extractor = HookExtractor::new(HookConfig::default()).with_oracle(oracle);
        let hooks = extractor.extract("Blue skies", &[]).await;
        assert_eq!(hooks, extractor.local_hooks("Blue skies"));
        assert!(!hooks.is_empty());
    }

    #[tokio::test]
    async fn test_empty_text_yields_nothing() {
        let oracle = Arc::new(ScriptedOracle::new().with_hooks(["x"]));
        let extractor = HookExtractor::new(HookConfig::default()).with_oracle(oracle.clone());
        assert!(extractor.extract("   ", &[]).await.is_empty());
        assert_eq!(oracle.total_calls(), 0);
    }

    #[test]
    fn test_category_hooks_whole_words() {
        let hooks = category_hooks("Can you recommend a restaurant? I like spicy food.");
        assert_eq!(hooks, vec!["question", "preference", "food"]);
        assert!(category_hooks("A mystery novel").is_empty());
    }

    #[test]
    fn test_extract_entities() {
        let entities = extract_entities("I met Ada Lovelace in London. London was rainy. Ok.");
        assert_eq!(entities, vec!["ada lovelace", "ada", "lovelace", "london"]);
    }
}
