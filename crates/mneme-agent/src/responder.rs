//! Response generation over retrieved memories.

use tracing::warn;

use mneme_llm::SharedOracle;
use mneme_llm::oracle::parse::strip_reasoning_preamble;
use mneme_memory::MemoryRecord;

/// Reply used whenever the oracle cannot produce an answer.
pub const APOLOGY: &str = "I'm having trouble generating a response right now. Let me try to help without accessing my memory. Could you please provide more details or ask your question in a different way?";

const MEMORY_PREAMBLE: &str =
    "Here are some relevant memories that might help you provide a better response:\n\n";

/// Answers a prompt with memories as context.
#[derive(Clone)]
pub struct ResponseGenerator {
    oracle: SharedOracle,
}

impl ResponseGenerator {
    pub fn new(oracle: SharedOracle) -> Self {
        Self { oracle }
    }

    pub async fn generate(&self, prompt: &str, memories: &[MemoryRecord]) -> String {
        let context = memory_context(memories);
        match self.oracle.generate_response(prompt, &context).await {
            Ok(reply) => {
                let reply = strip_reasoning_preamble(&reply);
                if reply.is_empty() {
                    warn!("Oracle returned an empty response");
                    APOLOGY.to_string()
                } else {
                    reply
                }
            }
            Err(e) => {
                warn!(error = %e, "Response generation failed");
                APOLOGY.to_string()
            }
        }
    }
}

/// Render memories as numbered, dated blocks. Empty when there are none.
pub fn memory_context(memories: &[MemoryRecord]) -> String {
    if memories.is_empty() {
        return String::new();
    }
    let mut context = String::from(MEMORY_PREAMBLE);
    for (i, memory) in memories.iter().enumerate() {
        context.push_str(&format!(
            "Memory {} (from {}):\n{}\n\n",
            i + 1,
            memory.timestamp.format("%Y-%m-%d %H:%M"),
            memory.display_text()
        ));
    }
    context
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use mneme_llm::{Capability, ScriptedOracle};
    use mneme_memory::{MemoryKind, MemoryRecord};
    use std::sync::Arc;

    fn record(content: &str, summary: Option<&str>) -> MemoryRecord {
        MemoryRecord {
            id: "episodic_x".into(),
            kind: MemoryKind::Episodic,
            content: content.into(),
            summary: summary.map(Into::into),
            hooks: vec!["x".into()],
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap(),
            conversation_id: None,
            extra: Default::default(),
        }
    }

    #[test]
    fn test_memory_context_format() {
        let context = memory_context(&[
            record("full text", Some("short summary")),
            record("only content", None),
        ]);
        assert_eq!(
            context,
            "Here are some relevant memories that might help you provide a better response:\n\n\
             Memory 1 (from 2024-05-01 09:30):\nshort summary\n\n\
             Memory 2 (from 2024-05-01 09:30):\nonly content\n\n"
        );
        assert_eq!(memory_context(&[]), "");
    }

    #[tokio::test]
    async fn test_generate_passes_context() {
        let oracle = Arc::new(ScriptedOracle::new().with_response("Your favorite color is blue."));
        let generator = ResponseGenerator::new(oracle.clone());
        let reply = generator
            .generate("What is my favorite color?", &[record("User likes blue", None)])
            .await;
        assert_eq!(reply, "Your favorite color is blue.");
        let input = &oracle.inputs(Capability::Generate)[0];
        assert!(input.contains("Memory 1 (from 2024-05-01 09:30):\nUser likes blue"));
        assert!(input.ends_with("User Input: What is my favorite color?"));
    }

    #[tokio::test]
    async fn test_generate_failure_apologizes() {
        let generator = ResponseGenerator::new(Arc::new(ScriptedOracle::failing()));
        assert_eq!(generator.generate("hello", &[]).await, APOLOGY);
    }
}
