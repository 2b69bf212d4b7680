//! LLM client abstraction and text oracle for mneme.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │  TextOracle trait                        │
//! │  summarize / extract / propose_hooks /   │
//! │  classify_tone / rank / generate         │
//! └──────────────────────────────────────────┘
//!          │                     │
//!          ▼                     ▼
//! ┌──────────────────┐   ┌────────────────┐
//! │ LlmOracle        │   │ ScriptedOracle │ (testing)
//! └──────────────────┘   └────────────────┘
//!          │
//!          ▼
//! ┌──────────────────┐
//! │ LlmBackend trait │ ── with_retry (rate limits only)
//! └──────────────────┘
//!     │          │
//!     ▼          ▼
//! Anthropic   MockBackend (testing)
//! ```

pub mod anthropic;
pub mod backend;
pub mod error;
pub mod oracle;
pub mod types;

pub use anthropic::{AnthropicBackend, AnthropicConfig, create_shared_backend};
#[cfg(any(test, feature = "testing"))]
pub use backend::MockBackend;
pub use backend::{LlmBackend, SharedBackend, with_retry};
pub use error::{LlmError, RateLimitInfo, Result};
pub use oracle::{
    LlmOracle, OracleConfig, Sentiment, SharedOracle, TextAnalysis, TextOracle, Tone,
};
#[cfg(any(test, feature = "testing"))]
pub use oracle::{Capability, ScriptedOracle};
pub use types::{CompletionRequest, CompletionResponse, ContentBlock, Message, Role, StopReason, Usage};
