//! Error types for the agent crate.

use thiserror::Error;

/// Result type alias using the agent error type.
pub type Result<T> = std::result::Result<T, AgentError>;

/// Error type for agent operations.
///
/// Oracle failures almost never reach this type: each call site falls back
/// locally. What remains is storage failure on the turn's critical path.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Memory, concept or conversation storage failed.
    #[error("Memory error: {0}")]
    Memory(#[from] mneme_memory::MemoryError),

    /// LLM backend error.
    #[error("LLM error: {0}")]
    Llm(#[from] mneme_llm::LlmError),

    /// Empty or otherwise unusable user input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl AgentError {
    /// Create an invalid input error.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AgentError::invalid_input("empty message");
        assert_eq!(err.to_string(), "Invalid input: empty message");

        let err: AgentError = mneme_memory::MemoryError::NotFound("conversation x".into()).into();
        assert!(err.to_string().contains("conversation x"));
    }
}
