//! Writes, point lookups, deletes and the hook inventory.

use chrono::Utc;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

use super::MemoryStore;
use crate::error::Result;
use crate::types::{MemoryKind, MemoryRecord, NewMemory, generate_id};
use crate::validation::{ValidationError, normalize_hooks, validate_content, validate_key};

/// Result of a non-episodic write.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreOutcome {
    /// The record was persisted.
    Stored(MemoryRecord),
    /// The record failed validation; nothing was written.
    Rejected(ValidationError),
}

impl StoreOutcome {
    pub fn is_stored(&self) -> bool {
        matches!(self, StoreOutcome::Stored(_))
    }

    pub fn record(&self) -> Option<&MemoryRecord> {
        match self {
            StoreOutcome::Stored(record) => Some(record),
            StoreOutcome::Rejected(_) => None,
        }
    }
}

impl MemoryStore {
    /// Persist an episodic record, then prune episodic memories.
    ///
    /// Missing id and timestamp are generated; hooks are normalized.
    pub fn store_episodic(&self, memory: NewMemory) -> Result<MemoryRecord> {
        validate_content(&memory.content)?;
        let record = self.build(MemoryKind::Episodic, memory)?;
        self.persist(&record)?;
        info!(id = %record.id, hooks = record.hooks.len(), "Stored episodic memory");

        if let Err(e) = self.prune(MemoryKind::Episodic) {
            warn!(error = %e, "Episodic pruning failed");
        }
        Ok(record)
    }

    /// Persist a non-episodic record, then prune non-episodic memories.
    ///
    /// Records without hooks (after normalization) are rejected unwritten.
    pub fn store_non_episodic(&self, memory: NewMemory) -> Result<StoreOutcome> {
        if let Err(reason) = validate_content(&memory.content) {
            return Ok(StoreOutcome::Rejected(reason));
        }
        if normalize_hooks(&memory.hooks).is_empty() {
            warn!("Rejected non-episodic memory without hooks");
            return Ok(StoreOutcome::Rejected(ValidationError::EmptyHooks));
        }

        let record = self.build(MemoryKind::NonEpisodic, memory)?;
        self.persist(&record)?;
        info!(id = %record.id, hooks = record.hooks.len(), "Stored non-episodic memory");

        if let Err(e) = self.prune(MemoryKind::NonEpisodic) {
            warn!(error = %e, "Non-episodic pruning failed");
        }
        Ok(StoreOutcome::Stored(record))
    }

    pub(super) fn build(&self, kind: MemoryKind, memory: NewMemory) -> Result<MemoryRecord> {
        let hooks = normalize_hooks(&memory.hooks);
        let timestamp = memory.timestamp.unwrap_or_else(Utc::now);
        let id = match memory.id {
            Some(id) => {
                validate_key(&id)?;
                id
            }
            None => generate_id(kind, timestamp, hooks.first().map(String::as_str)),
        };
        let conversation_id = match kind {
            MemoryKind::Episodic => memory.conversation_id,
            MemoryKind::NonEpisodic => None,
        };
        Ok(MemoryRecord {
            id,
            kind,
            content: memory.content,
            summary: memory.summary.filter(|s| !s.trim().is_empty()),
            hooks,
            timestamp,
            conversation_id,
            extra: serde_json::Map::new(),
        })
    }

    /// Look up a record by id in either kind.
    pub fn get(&self, id: &str) -> Result<Option<MemoryRecord>> {
        for kind in MemoryKind::ALL {
            if let Some(record) = self.load(kind, id)? {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }

    /// Delete a record by id. Returns `false` if no such record exists.
    pub fn delete(&self, id: &str) -> Result<bool> {
        for kind in MemoryKind::ALL {
            if self.docs(kind).remove(id)? {
                info!(id = %id, kind = %kind, "Deleted memory");
                return Ok(true);
            }
        }
        debug!(id = %id, "Delete of missing memory");
        Ok(false)
    }

    /// Union of hooks across all records of both kinds.
    pub fn all_hooks(&self) -> Result<BTreeSet<String>> {
        let mut hooks = BTreeSet::new();
        for kind in MemoryKind::ALL {
            for record in self.scan(kind)? {
                hooks.extend(record.hooks.into_iter().map(|h| h.to_lowercase()));
            }
        }
        Ok(hooks)
    }
}
