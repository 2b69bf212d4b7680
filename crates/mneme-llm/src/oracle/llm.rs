//! Text oracle backed by an LLM.

use async_trait::async_trait;
use tracing::debug;

use super::parse;
use super::{TextAnalysis, TextOracle, Tone};
use crate::backend::SharedBackend;
use crate::error::{LlmError, Result};
use crate::types::{CompletionRequest, Message};

const HOOKS_INSTRUCTION: &str = r#"Analyze the text below and generate index hooks for later retrieval.

Hooks are one to three word phrases that capture key entities, concepts, sentiments, or themes in the text. Good hooks are specific, diverse, and cover different aspects of the text. Include both general topics and specific details.

Examples of good hooks:
- A text about a vacation: "beach trip", "summer vacation", "family bonding"
- A technical article: "machine learning", "neural networks", "data science"
- A conversation about food: "favorite foods", "cooking recipes", "dietary preferences""#;

const ANALYSIS_INSTRUCTION: &str = r#"Analyze the text below and extract:
1. keywords: important nouns, verbs, and adjectives (max 10)
2. themes: high-level topics or concepts present in the text (max 5)
3. sentiment: the overall emotional tone, one of positive, negative, neutral, mixed

Respond with ONLY a JSON object with keys "keywords", "themes", and "sentiment"."#;

const SUMMARY_INSTRUCTION: &str = r#"Write a concise and accurate summary of the text below. The summary must:
1. Capture the main points and key information
2. Be written in third person, neutral tone
3. Contain no meta-commentary, labels, or self-references"#;

const RANKING_INSTRUCTION: &str = r#"Rank the numbered memories below by relevance to the prompt. Consider:
1. Direct relevance to the subject matter or question
2. Temporal relevance, if the prompt asks about a specific time
3. Semantic connections between the prompt and the memory content

Respond with ONLY a JSON array of memory numbers, most relevant first. Example: [3, 1, 5, 2, 4]"#;

const RESPONSE_SYSTEM: &str = r#"You are an assistant with access to memories from past interactions. Generate a helpful, coherent, and contextually appropriate response to the user's input.

Use the memories when they are relevant, to give personalized and contextually aware responses. You don't need to mention that you are using memories unless it adds value.

Do not include your internal reasoning or thinking process. Do not start with phrases like "I'll acknowledge..." or other meta-commentary. Reply directly, as in a natural conversation."#;

const FACTS_INSTRUCTION: &str = r#"Extract standalone facts from the interaction below that would be useful to remember in future conversations: preferences, personal details, stated truths.

For example, from "User: My favorite color is blue. Assistant: Blue is a calming color." you might extract "User's favorite color is blue".

Extract 0 to 3 facts, and only concrete, useful ones. Respond with ONLY a JSON array of strings. If there is nothing worth keeping, respond with []."#;

const CONCEPT_INSTRUCTION: &str = r#"You are updating a knowledge base of people, places, and concepts. From the memory below, write a short, natural summary of what it reveals about the given concept. Focus on facts, traits, or events tied to it. Do not write "this memory shows" or similar; write the knowledge as if updating a profile."#;

const TONE_INSTRUCTION: &str = "Classify the tone of the statement below as exactly one of: literal, metaphorical, hypothetical, rhetorical, sarcastic, unclear. Respond with the single word only.";

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Model selection for the LLM-backed oracle.
#[derive(Debug, Clone)]
pub struct OracleConfig {
    /// Model for generation, ranking and summaries.
    pub model: String,
    /// Model for short extraction calls.
    pub fast_model: String,
    /// Token ceiling for generated responses.
    pub max_tokens: u32,
}

impl OracleConfig {
    pub fn new(model: impl Into<String>, fast_model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            fast_model: fast_model.into(),
            max_tokens: 1024,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// LLM Oracle
// ─────────────────────────────────────────────────────────────────────────────

/// [`TextOracle`] implementation that prompts an [`LlmBackend`](crate::LlmBackend).
pub struct LlmOracle {
    backend: SharedBackend,
    config: OracleConfig,
}

impl LlmOracle {
    pub fn new(backend: SharedBackend, config: OracleConfig) -> Self {
        Self { backend, config }
    }

    async fn ask(
        &self,
        model: &str,
        system: Option<&str>,
        prompt: String,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String> {
        let mut request = CompletionRequest::new(model, vec![Message::user(prompt)], max_tokens)
            .with_temperature(temperature);
        if let Some(system) = system {
            request = request.with_system(system);
        }

        let response = self.backend.complete(request).await?;
        let text = response.text();
        debug!(
            backend = self.backend.name(),
            model,
            output_tokens = response.usage.output_tokens,
            "Oracle reply received"
        );
        Ok(text)
    }
}

fn unusable(capability: &str, reply: &str) -> LlmError {
    let preview: String = reply.chars().take(80).collect();
    LlmError::UnusableResponse(format!("{capability}: {preview:?}"))
}

#[async_trait]
impl TextOracle for LlmOracle {
    async fn summarize(&self, text: &str, max_length: usize) -> Result<String> {
        let prompt = format!(
            "{SUMMARY_INSTRUCTION}\n4. Be at most {max_length} characters\n\nText: {text}\n\nSummary (max {max_length} characters):"
        );
        let reply = self
            .ask(&self.config.model, None, prompt, 0.3, self.config.max_tokens)
            .await?;
        let summary = parse::clean_summary(&reply);
        if summary.is_empty() {
            return Err(unusable("summarize", &reply));
        }
        Ok(parse::truncate_with_ellipsis(&summary, max_length))
    }

    async fn extract_keywords_themes_sentiment(&self, text: &str) -> Result<TextAnalysis> {
        let prompt = format!("{ANALYSIS_INSTRUCTION}\n\nText: {text}");
        let reply = self
            .ask(&self.config.fast_model, None, prompt, 0.3, 512)
            .await?;
        parse::parse_analysis(&reply).ok_or_else(|| unusable("extract", &reply))
    }

    async fn propose_hooks(
        &self,
        text: &str,
        existing_hooks: &[String],
        max_hooks: usize,
    ) -> Result<Vec<String>> {
        let existing = if existing_hooks.is_empty() {
            String::new()
        } else {
            format!(
                "\n\nHooks already identified (add different ones): {}",
                existing_hooks.join(", ")
            )
        };
        let prompt = format!(
            "{HOOKS_INSTRUCTION}\n\nGenerate up to {max_hooks} hooks.{existing}\n\nText: {text}\n\nRespond with ONLY a JSON array of strings. Example: [\"hook1\", \"hook2\"]"
        );
        let reply = self
            .ask(&self.config.fast_model, None, prompt, 0.3, 512)
            .await?;
        let hooks = parse::parse_string_list(&reply).ok_or_else(|| unusable("hooks", &reply))?;
        Ok(hooks.into_iter().take(max_hooks).collect())
    }

    async fn classify_tone(&self, text: &str) -> Result<Tone> {
        let prompt = format!("{TONE_INSTRUCTION}\n\nStatement:\n\"{text}\"");
        let reply = self
            .ask(&self.config.fast_model, None, prompt, 0.0, 20)
            .await?;
        Ok(parse::parse_tone(&reply))
    }

    async fn rank_by_relevance(&self, query: &str, candidates: &[String]) -> Result<Vec<usize>> {
        let listing = candidates
            .iter()
            .enumerate()
            .map(|(i, c)| format!("Memory {}: {}", i + 1, c))
            .collect::<Vec<_>>()
            .join("\n");
        let prompt = format!(
            "{RANKING_INSTRUCTION}\n\nPrompt: \"{query}\"\n\nMemories:\n{listing}"
        );
        let reply = self
            .ask(&self.config.model, None, prompt, 0.2, 256)
            .await?;
        parse::parse_index_list(&reply).ok_or_else(|| unusable("rank", &reply))
    }

    async fn generate_response(&self, query: &str, context: &str) -> Result<String> {
        let prompt = format!(
            "{context}\n\nUser Input: {query}\n\nPlease provide a direct, helpful response without including your internal reasoning process."
        );
        let reply = self
            .ask(
                &self.config.model,
                Some(RESPONSE_SYSTEM),
                prompt,
                0.7,
                self.config.max_tokens,
            )
            .await?;
        if reply.trim().is_empty() {
            return Err(unusable("generate", &reply));
        }
        Ok(reply)
    }

    async fn extract_facts(&self, text: &str) -> Result<Vec<String>> {
        let prompt = format!("{FACTS_INSTRUCTION}\n\nInteraction:\n{text}");
        let reply = self
            .ask(&self.config.fast_model, None, prompt, 0.3, 512)
            .await?;
        let facts = parse::parse_string_list(&reply).ok_or_else(|| unusable("facts", &reply))?;
        Ok(facts.into_iter().take(3).collect())
    }

    async fn describe_concept(&self, concept: &str, text: &str) -> Result<String> {
        let prompt =
            format!("{CONCEPT_INSTRUCTION}\n\nConcept: \"{concept}\"\n\nMemory:\n\"{text}\"");
        let reply = self
            .ask(&self.config.model, None, prompt, 0.3, 150)
            .await?;
        let summary = reply.trim();
        if summary.is_empty() {
            return Err(unusable("describe", &reply));
        }
        Ok(summary.to_string())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;
    use crate::oracle::Sentiment;
    use std::sync::Arc;

    fn oracle_with(replies: &[&str]) -> (LlmOracle, Arc<MockBackend>) {
        let backend = Arc::new(MockBackend::with_texts(replies.iter().copied()));
        let oracle = LlmOracle::new(backend.clone(), OracleConfig::new("main", "fast"));
        (oracle, backend)
    }

    #[tokio::test]
    async fn test_propose_hooks_uses_fast_model_and_caps() {
        let (oracle, backend) = oracle_with(&["[\"a b\", \"c\", \"d\"]"]);
        let hooks = oracle
            .propose_hooks("some text", &["existing".to_string()], 2)
            .await
            .unwrap();
        assert_eq!(hooks, vec!["a b", "c"]);

        let requests = backend.requests();
        let request = &requests[0];
        assert_eq!(request.model, "fast");
        let prompt = request.last_user_text().unwrap();
        assert!(prompt.contains("existing"));
        assert!(prompt.contains("Text: some text"));
    }

    #[tokio::test]
    async fn test_propose_hooks_unusable_reply() {
        let (oracle, _) = oracle_with(&["I am unable to help with that"]);
        let err = oracle.propose_hooks("x", &[], 5).await.unwrap_err();
        assert!(matches!(err, LlmError::UnusableResponse(_)));
    }

    #[tokio::test]
    async fn test_rank_lists_candidates_with_numbers() {
        let (oracle, backend) = oracle_with(&["[2, 1]"]);
        let order = oracle
            .rank_by_relevance("colors", &["first".to_string(), "second".to_string()])
            .await
            .unwrap();
        assert_eq!(order, vec![2, 1]);
        let requests = backend.requests();
        let prompt = requests[0].last_user_text().unwrap();
        assert!(prompt.contains("Memory 1: first"));
        assert!(prompt.contains("Memory 2: second"));
        assert_eq!(requests[0].model, "main");
    }

    #[tokio::test]
    async fn test_summarize_cleans_and_truncates() {
        let (oracle, _) = oracle_with(&["Summary: The user described a long trip across Europe."]);
        let summary = oracle.summarize("...", 20).await.unwrap();
        assert_eq!(summary, "The user describe...");
    }

    #[tokio::test]
    async fn test_extract_analysis() {
        let (oracle, _) = oracle_with(&[
            "{\"keywords\": [\"blue\"], \"themes\": [\"color\"], \"sentiment\": \"negative\"}",
        ]);
        let analysis = oracle.extract_keywords_themes_sentiment("x").await.unwrap();
        assert_eq!(analysis.keywords, vec!["blue"]);
        assert_eq!(analysis.sentiment, Sentiment::Negative);
    }

    #[tokio::test]
    async fn test_tone_and_generate() {
        let (oracle, backend) = oracle_with(&["Hypothetical", "Hello!"]);
        assert_eq!(oracle.classify_tone("if I were").await.unwrap(), Tone::Hypothetical);
        let reply = oracle.generate_response("hi", "Memory 1: x").await.unwrap();
        assert_eq!(reply, "Hello!");
        let requests = backend.requests();
        let request = &requests[1];
        assert!(request.system.as_deref().unwrap().contains("internal reasoning"));
        assert!(request.last_user_text().unwrap().starts_with("Memory 1: x"));
    }

    #[tokio::test]
    async fn test_backend_failure_propagates() {
        let (oracle, _) = oracle_with(&[]);
        let err = oracle.extract_facts("x").await.unwrap_err();
        assert!(matches!(err, LlmError::Backend(_)));
    }

    #[tokio::test]
    async fn test_extract_facts_limits_to_three() {
        let (oracle, _) = oracle_with(&["[\"a\", \"b\", \"c\", \"d\"]"]);
        assert_eq!(oracle.extract_facts("x").await.unwrap().len(), 3);
    }
}
