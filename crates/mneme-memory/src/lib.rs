//! Memory storage and retrieval for mneme.
//!
//! This crate keeps everything the assistant remembers:
//! - **Memory store**: episodic turns and non-episodic facts, one JSON
//!   document per record, indexed only by hooks
//! - **Retention pruning**: capacity and age limits enforced after writes
//! - **Relevancer**: hook/date lookup with oracle ranking
//! - **Concept graph**: one node per concept with traits, tags, relations
//!   and links back to memories
//! - **Conversations**: append-only transcripts
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                      Relevancer                         │
//! │   HookExtractor ─► MemoryStore::query ─► oracle rank    │
//! └─────────────────────────────────────────────────────────┘
//!                │                              │
//!                ▼                              ▼
//! ┌──────────────────────────┐   ┌──────────────────────────┐
//! │ MemoryStore (+ pruning)  │   │ ConceptManager           │
//! │ episodic/ non_episodic/  │   │ concepts/                │
//! └──────────────────────────┘   └──────────────────────────┘
//!                │                              │
//!                └──────────────┬───────────────┘
//!                               ▼
//!                 DocumentStore (file or in-memory)
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use mneme_memory::{MemoryQuery, MemoryStore, NewMemory, StoreConfig};
//!
//! let store = MemoryStore::open("/tmp/mneme".as_ref(), StoreConfig::default())?;
//! store.store_episodic(
//!     NewMemory::new("User: My favorite color is blue").with_hooks(["blue", "color"]),
//! )?;
//! let found = store.query(&MemoryQuery::episodic().with_hooks(["blue"]))?;
//! assert_eq!(found.len(), 1);
//! # Ok::<(), mneme_memory::MemoryError>(())
//! ```

pub mod concept;
pub mod conversation;
pub mod date_filter;
pub mod document;
pub mod error;
pub mod hooks;
pub mod relevance;
pub mod store;
pub mod types;
pub mod validation;

pub use concept::{ConceptManager, ConceptNode, UNKNOWN_TYPE, concept_key, value_text};
pub use conversation::{ChatMessage, ChatRole, Conversation, ConversationStore, derive_title};
pub use date_filter::{DateFilter, TemporalHint, detect_temporal, extract_dates};
pub use document::{DocumentStore, FileDocumentStore, InMemoryDocumentStore};
pub use error::{MemoryError, Result};
pub use hooks::{HookConfig, HookExtractor, category_hooks, contains_phrase, extract_entities};
pub use relevance::{QueryHints, RelevanceConfig, Relevancer};
pub use store::{MemoryQuery, MemoryStore, PruneReport, StoreConfig, StoreOutcome};
pub use types::{MemoryKind, MemoryRecord, NewMemory, parse_timestamp};
pub use validation::{ValidationError, normalize_hooks};
