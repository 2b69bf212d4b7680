//! Conversation transcripts: append-only message lists, one document each.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::document::{DocumentStore, FileDocumentStore, InMemoryDocumentStore};
use crate::error::{MemoryError, Result};
use crate::types::lenient_timestamp;

/// Characters of the first message used as the title.
pub const TITLE_LENGTH: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
    System,
}

impl std::fmt::Display for ChatRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
            ChatRole::System => "system",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// A stored conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(deserialize_with = "lenient_timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(deserialize_with = "lenient_timestamp")]
    pub updated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Title derived from the opening message.
pub fn derive_title(content: &str) -> String {
    content.chars().take(TITLE_LENGTH).collect()
}

/// Persists conversations by id.
#[derive(Clone)]
pub struct ConversationStore {
    docs: Arc<dyn DocumentStore>,
}

impl ConversationStore {
    pub fn open(dir: &Path) -> Result<Self> {
        Ok(Self::with_store(Arc::new(FileDocumentStore::open(dir)?)))
    }

    pub fn in_memory() -> Self {
        Self::with_store(Arc::new(InMemoryDocumentStore::new()))
    }

    pub fn with_store(docs: Arc<dyn DocumentStore>) -> Self {
        Self { docs }
    }

    /// Start a conversation with its first message.
    pub fn create(&self, initial: ChatMessage) -> Result<Conversation> {
        let now = Utc::now();
        let conversation = Conversation {
            id: Uuid::new_v4().to_string(),
            title: derive_title(&initial.content),
            messages: vec![initial],
            created_at: now,
            updated_at: now,
            extra: serde_json::Map::new(),
        };
        self.persist(&conversation)?;
        info!(id = %conversation.id, "Created conversation");
        Ok(conversation)
    }

    /// Append a message to an existing conversation.
    pub fn add_message(&self, id: &str, message: ChatMessage) -> Result<Conversation> {
        let mut conversation = self
            .get(id)?
            .ok_or_else(|| MemoryError::NotFound(format!("conversation {id}")))?;
        conversation.messages.push(message);
        conversation.updated_at = Utc::now();
        self.persist(&conversation)?;
        Ok(conversation)
    }

    pub fn get(&self, id: &str) -> Result<Option<Conversation>> {
        let Some(raw) = self.docs.read(id)? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_str(&raw)?))
    }

    /// Most recently updated first. Unreadable documents are skipped.
    pub fn list(&self, limit: usize) -> Result<Vec<Conversation>> {
        let mut conversations = Vec::new();
        for key in self.docs.keys()? {
            match self.get(&key) {
                Ok(Some(conversation)) => conversations.push(conversation),
                Ok(None) => {}
                Err(e) => warn!(key = %key, error = %e, "Skipping unreadable conversation"),
            }
        }
        conversations.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        conversations.truncate(limit);
        Ok(conversations)
    }

    fn persist(&self, conversation: &Conversation) -> Result<()> {
        let json = serde_json::to_string_pretty(conversation)?;
        self.docs.write(&conversation.id, &json)
    }
}
