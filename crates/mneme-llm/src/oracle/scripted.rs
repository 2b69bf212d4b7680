//! Deterministic oracle double for tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

use super::{TextAnalysis, TextOracle, Tone};
use crate::error::{LlmError, Result};

/// One oracle capability, for call accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Summarize,
    Extract,
    ProposeHooks,
    ClassifyTone,
    Rank,
    Generate,
    ExtractFacts,
    DescribeConcept,
}

#[derive(Debug, Default)]
struct Script {
    summary: Option<String>,
    analysis: Option<TextAnalysis>,
    hooks: Option<Vec<String>>,
    tone: Option<Tone>,
    ranking: Option<Vec<usize>>,
    response: Option<String>,
    facts: Option<Vec<String>>,
    concept_summary: Option<String>,
}

/// An oracle that answers from a fixed script.
///
/// Capabilities without a scripted answer fail with
/// [`LlmError::UnusableResponse`], which is how tests exercise fallbacks.
/// Every call is recorded with its primary input.
#[derive(Debug, Default)]
pub struct ScriptedOracle {
    script: Script,
    calls: Mutex<HashMap<Capability, usize>>,
    inputs: Mutex<Vec<(Capability, String)>>,
}

impl ScriptedOracle {
    /// An oracle with nothing scripted: every call fails.
    pub fn new() -> Self {
        Self::default()
    }

    /// Alias of [`ScriptedOracle::new`] for readability at call sites.
    pub fn failing() -> Self {
        Self::default()
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.script.summary = Some(summary.into());
        self
    }

    pub fn with_analysis(mut self, analysis: TextAnalysis) -> Self {
        self.script.analysis = Some(analysis);
        self
    }

    pub fn with_hooks<I, S>(mut self, hooks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.script.hooks = Some(hooks.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_tone(mut self, tone: Tone) -> Self {
        self.script.tone = Some(tone);
        self
    }

    /// Script the 1-based ranking, verbatim (out-of-range values included).
    pub fn with_ranking(mut self, ranking: Vec<usize>) -> Self {
        self.script.ranking = Some(ranking);
        self
    }

    pub fn with_response(mut self, response: impl Into<String>) -> Self {
        self.script.response = Some(response.into());
        self
    }

    pub fn with_facts<I, S>(mut self, facts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.script.facts = Some(facts.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_concept_summary(mut self, summary: impl Into<String>) -> Self {
        self.script.concept_summary = Some(summary.into());
        self
    }

    /// Number of calls made to one capability.
    pub fn calls(&self, capability: Capability) -> usize {
        self.calls.lock().get(&capability).copied().unwrap_or(0)
    }

    /// Number of calls across all capabilities.
    pub fn total_calls(&self) -> usize {
        self.calls.lock().values().sum()
    }

    /// Inputs passed to one capability, in call order.
    pub fn inputs(&self, capability: Capability) -> Vec<String> {
        self.inputs
            .lock()
            .iter()
            .filter(|(c, _)| *c == capability)
            .map(|(_, input)| input.clone())
            .collect()
    }

    fn answer<T: Clone>(
        &self,
        capability: Capability,
        input: &str,
        scripted: &Option<T>,
    ) -> Result<T> {
        *self.calls.lock().entry(capability).or_insert(0) += 1;
        self.inputs.lock().push((capability, input.to_string()));
        scripted.clone().ok_or_else(|| {
            LlmError::UnusableResponse(format!("{capability:?} not scripted"))
        })
    }
}

#[async_trait]
impl TextOracle for ScriptedOracle {
    async fn summarize(&self, text: &str, _max_length: usize) -> Result<String> {
        self.answer(Capability::Summarize, text, &self.script.summary)
    }

    async fn extract_keywords_themes_sentiment(&self, text: &str) -> Result<TextAnalysis> {
        self.answer(Capability::Extract, text, &self.script.analysis)
    }

    async fn propose_hooks(
        &self,
        text: &str,
        _existing_hooks: &[String],
        max_hooks: usize,
    ) -> Result<Vec<String>> {
        let hooks = self.answer(Capability::ProposeHooks, text, &self.script.hooks)?;
        Ok(hooks.into_iter().take(max_hooks).collect())
    }

    async fn classify_tone(&self, text: &str) -> Result<Tone> {
        self.answer(Capability::ClassifyTone, text, &self.script.tone)
    }

    async fn rank_by_relevance(&self, query: &str, candidates: &[String]) -> Result<Vec<usize>> {
        let input = format!("{query}\n{}", candidates.join("\n"));
        self.answer(Capability::Rank, &input, &self.script.ranking)
    }

    async fn generate_response(&self, query: &str, context: &str) -> Result<String> {
        let input = format!("{context}\n\nUser Input: {query}");
        self.answer(Capability::Generate, &input, &self.script.response)
    }

    async fn extract_facts(&self, text: &str) -> Result<Vec<String>> {
        self.answer(Capability::ExtractFacts, text, &self.script.facts)
    }

    async fn describe_concept(&self, concept: &str, text: &str) -> Result<String> {
        let input = format!("{concept}: {text}");
        self.answer(
            Capability::DescribeConcept,
            &input,
            &self.script.concept_summary,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unscripted_capability_fails_and_counts() {
        let oracle = ScriptedOracle::failing();
        assert!(oracle.summarize("x", 10).await.is_err());
        assert!(oracle.classify_tone("x").await.is_err());
        assert_eq!(oracle.calls(Capability::Summarize), 1);
        assert_eq!(oracle.total_calls(), 2);
    }

    #[tokio::test]
    async fn test_scripted_answers() {
        let oracle = ScriptedOracle::new()
            .with_hooks(["a", "b", "c"])
            .with_ranking(vec![2, 1])
            .with_tone(Tone::Literal);
        assert_eq!(oracle.propose_hooks("t", &[], 2).await.unwrap(), vec!["a", "b"]);
        assert_eq!(
            oracle
                .rank_by_relevance("q", &["x".into(), "y".into()])
                .await
                .unwrap(),
            vec![2, 1]
        );
        assert_eq!(oracle.classify_tone("t").await.unwrap(), Tone::Literal);
        assert_eq!(oracle.inputs(Capability::ProposeHooks), vec!["t"]);
    }
}
