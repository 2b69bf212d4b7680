//! Episode summaries: cheap rules first, the oracle only for long prose.
//!
//! Rules, in order:
//! 1. empty input stays empty
//! 2. input within the limit is kept verbatim
//! 3. `User: ... Assistant: ...` transcripts become `Conversation about <topics>`
//! 4. three or fewer sentences become the first two, if they fit
//! 5. anything else goes to the oracle, cleaned and truncated
//!
//! When the oracle is absent or fails, leading sentences are packed into
//! the limit instead.

use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, warn};

use mneme_llm::SharedOracle;
use mneme_llm::oracle::parse::{clean_summary, truncate_with_ellipsis};
use mneme_memory::contains_phrase;

static TRANSCRIPT_TURN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)User:\s+(.+?)\n+Assistant:\s+(.+?)(?:\n|$)").expect("valid regex")
});

/// Topic labels and the user phrases that suggest them.
const TOPICS: &[(&str, &[&str])] = &[
    ("personal information", &["my name", "i am", "about me", "myself"]),
    ("technology", &["computer", "software", "code", "program", "app"]),
    ("health", &["health", "medical", "doctor", "sick", "illness"]),
    ("food", &["food", "eat", "cook", "recipe", "restaurant"]),
    ("travel", &["travel", "trip", "vacation", "visit", "country"]),
    ("work", &["job", "work", "career", "employer", "company"]),
];

/// Produces bounded-length summaries.
#[derive(Clone)]
pub struct Summarizer {
    max_length: usize,
    oracle: Option<SharedOracle>,
}

impl Summarizer {
    pub fn new(max_length: usize) -> Self {
        Self {
            max_length,
            oracle: None,
        }
    }

    pub fn with_oracle(mut self, oracle: SharedOracle) -> Self {
        self.oracle = Some(oracle);
        self
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Summarize `text` in at most `max_length` characters.
    pub async fn summarize(&self, text: &str) -> String {
        let text = text.trim();
        if text.is_empty() {
            return String::new();
        }
        if char_len(text) <= self.max_length {
            return text.to_string();
        }
        if let Some(summary) = self.rule_based(text) {
            debug!(len = summary.len(), "Rule-based summary");
            return summary;
        }

        if let Some(oracle) = &self.oracle {
            match oracle.summarize(text, self.max_length).await {
                Ok(raw) => {
                    let cleaned = clean_summary(&raw);
                    if !cleaned.is_empty() {
                        return truncate_with_ellipsis(&cleaned, self.max_length);
                    }
                    warn!("Oracle returned an empty summary, using leading sentences");
                }
                Err(e) => warn!(error = %e, "Summarization failed, using leading sentences"),
            }
        }
        leading_sentences(text, self.max_length)
    }

    fn rule_based(&self, text: &str) -> Option<String> {
        let topics = transcript_topics(text);
        if !topics.is_empty() {
            let summary = format!("Conversation about {}", topics.join(", "));
            if char_len(&summary) <= self.max_length {
                return Some(summary);
            }
        }

        let sentences = split_sentences(text);
        if sentences.len() <= 3 {
            let head = sentences.iter().take(2).copied().collect::<Vec<_>>().join(" ");
            if char_len(&head) <= self.max_length {
                return Some(head);
            }
        }
        None
    }
}

/// Topics mentioned by the user across every turn of a transcript, in table order.
fn transcript_topics(text: &str) -> Vec<&'static str> {
    let user_turns: Vec<String> = TRANSCRIPT_TURN
        .captures_iter(text)
        .map(|caps| caps[1].to_lowercase())
        .collect();
    TOPICS
        .iter()
        .filter(|(_, phrases)| {
            user_turns
                .iter()
                .any(|turn| phrases.iter().any(|p| contains_phrase(turn, p)))
        })
        .map(|(topic, _)| *topic)
        .collect()
}

/// Split after `.`, `!` or `?` followed by whitespace.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        let end = i + c.len_utf8();
        let mut next = end;
        while let Some(&(j, w)) = chars.peek() {
            if !w.is_whitespace() {
                break;
            }
            next = j + w.len_utf8();
            chars.next();
        }
        if next > end {
            sentences.push(&text[start..end]);
            start = next;
        }
    }
    if start < text.len() {
        sentences.push(&text[start..]);
    }
    sentences
}

/// Pack leading sentences into `max_length`, or hard-truncate the text when
/// even the first one is too long.
fn leading_sentences(text: &str, max_length: usize) -> String {
    let mut summary = String::new();
    for sentence in split_sentences(text) {
        let needed = if summary.is_empty() {
            char_len(sentence)
        } else {
            char_len(&summary) + 1 + char_len(sentence)
        };
        if needed > max_length {
            break;
        }
        if !summary.is_empty() {
            summary.push(' ');
        }
        summary.push_str(sentence);
    }
    if summary.is_empty() {
        return truncate_with_ellipsis(text, max_length);
    }
    summary
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mneme_llm::{Capability, ScriptedOracle};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_empty_and_short_input() {
        let summarizer = Summarizer::new(50);
        assert_eq!(summarizer.summarize("").await, "");
        assert_eq!(summarizer.summarize("  ").await, "");
        assert_eq!(summarizer.summarize("Short note.").await, "Short note.");
    }

    #[tokio::test]
    async fn test_transcript_topics() {
        let summarizer = Summarizer::new(60);
        let text = "User: My name is Ada and I write code for a living at a big company\n\n\
                    Assistant: Nice to meet you, Ada! Writing software is a great career.";
        assert_eq!(
            summarizer.summarize(text).await,
            "Conversation about personal information, technology, work"
        );
    }

    #[tokio::test]
    async fn test_few_sentences_keep_first_two() {
        let summarizer = Summarizer::new(40);
        let text = "The sky was grey. Rain started at noon. Everyone went inside quickly.";
        assert_eq!(
            summarizer.summarize(text).await,
            "The sky was grey. Rain started at noon."
        );
    }

    #[tokio::test]
    async fn test_long_prose_uses_oracle_and_cleans() {
        let oracle = Arc::new(ScriptedOracle::new().with_summary("Summary: A walk in the park."));
        let summarizer = Summarizer::new(30).with_oracle(oracle.clone());
        let text = "We walked. The park was busy. Dogs ran everywhere. Kids played on swings.";
        assert_eq!(summarizer.summarize(text).await, "A walk in the park.");
        assert_eq!(oracle.calls(Capability::Summarize), 1);
    }

    #[tokio::test]
    async fn test_oracle_failure_packs_leading_sentences() {
        let summarizer = Summarizer::new(30).with_oracle(Arc::new(ScriptedOracle::failing()));
        let text = "We walked. The park was busy. Dogs ran everywhere. Kids played on swings.";
        assert_eq!(summarizer.summarize(text).await, "We walked. The park was busy.");
    }

    #[tokio::test]
    async fn test_unsplittable_text_is_truncated() {
        let summarizer = Summarizer::new(10);
        let text = "a".repeat(40) + ". b. c. d.";
        let summary = summarizer.summarize(&text).await;
        assert_eq!(summary, "aaaaaaa...");
        assert_eq!(summary.chars().count(), 10);
    }

    #[test]
    fn test_split_sentences() {
        assert_eq!(
            split_sentences("One. Two!  Three? four"),
            vec!["One.", "Two!", "Three?", "four"]
        );
        assert_eq!(split_sentences("v1.2 is out."), vec!["v1.2 is out."]);
    }
}
