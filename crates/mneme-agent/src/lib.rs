//! Turn orchestration for mneme.
//!
//! One turn runs through these stages:
//!
//! ```text
//! input ─► PromptAnalyzer ─► Relevancer ─► ResponseGenerator ─► reply
//!                                                  │
//!                      ConversationStore ◄─────────┤
//!                      MemoryUpdater ◄─────────────┤  (episode + facts)
//!                      ConceptIndexer ◄────────────┘  (optional)
//! ```
//!
//! Every oracle call has a local fallback, so a turn degrades instead of
//! failing when the model is unavailable.

pub mod assistant;
pub mod concepts;
pub mod config;
pub mod error;
pub mod prompt;
pub mod responder;
pub mod summarizer;
pub mod updater;

pub use assistant::{Assistant, TurnOutcome};
pub use concepts::ConceptIndexer;
pub use config::{AgentConfig, ConceptConfig};
pub use error::{AgentError, Result};
pub use prompt::{ProcessedPrompt, PromptAnalyzer};
pub use responder::{APOLOGY, ResponseGenerator, memory_context};
pub use summarizer::{Summarizer, split_sentences};
pub use updater::{MAX_FACTS, MemoryUpdater, UpdateReport, local_facts};
