//! The memory store: episodic and non-episodic records, one document each.
//!
//! Operations are split across modules:
//! - `memory_ops`: writes, lookup, delete, hook inventory
//! - `query`: hook/date filtered reads
//! - `prune`: retention and capacity enforcement, run after every write
//!
//! # Consistency
//!
//! The store assumes a single logical writer. Reads only touch complete
//! documents and may run concurrently; concurrent writers to the same
//! record, or a write racing a prune pass, are last-write-wins.

mod memory_ops;
mod prune;
mod query;

use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::document::{DocumentStore, FileDocumentStore, InMemoryDocumentStore};
use crate::error::Result;
use crate::types::{MemoryKind, MemoryRecord};

pub use memory_ops::StoreOutcome;
pub use prune::PruneReport;
pub use query::MemoryQuery;

/// Capacity and retention limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreConfig {
    pub max_episodic: usize,
    pub max_non_episodic: usize,
    /// Episodic records older than this are pruned once the cap is exceeded.
    pub retention_days: i64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_episodic: 1000,
            max_non_episodic: 500,
            retention_days: 30,
        }
    }
}

/// File-per-record memory store.
#[derive(Clone)]
pub struct MemoryStore {
    episodic: Arc<dyn DocumentStore>,
    non_episodic: Arc<dyn DocumentStore>,
    config: StoreConfig,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("episodic", &self.episodic.location())
            .field("non_episodic", &self.non_episodic.location())
            .field("config", &self.config)
            .finish()
    }
}

impl MemoryStore {
    /// Open a store rooted at `root`, with `episodic/` and `non_episodic/` beneath it.
    pub fn open(root: &Path, config: StoreConfig) -> Result<Self> {
        let episodic = FileDocumentStore::open(root.join(MemoryKind::Episodic.dir_name()))?;
        let non_episodic = FileDocumentStore::open(root.join(MemoryKind::NonEpisodic.dir_name()))?;
        info!(root = %root.display(), "Opened memory store");
        Ok(Self::with_stores(Arc::new(episodic), Arc::new(non_episodic), config))
    }

    /// A store that lives only in memory.
    pub fn in_memory(config: StoreConfig) -> Self {
        Self::with_stores(
            Arc::new(InMemoryDocumentStore::new()),
            Arc::new(InMemoryDocumentStore::new()),
            config,
        )
    }

    /// Build over arbitrary document stores.
    pub fn with_stores(
        episodic: Arc<dyn DocumentStore>,
        non_episodic: Arc<dyn DocumentStore>,
        config: StoreConfig,
    ) -> Self {
        Self {
            episodic,
            non_episodic,
            config,
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn docs(&self, kind: MemoryKind) -> &dyn DocumentStore {
        match kind {
            MemoryKind::Episodic => self.episodic.as_ref(),
            MemoryKind::NonEpisodic => self.non_episodic.as_ref(),
        }
    }

    /// Number of documents of one kind, readable or not.
    pub fn count(&self, kind: MemoryKind) -> Result<usize> {
        self.docs(kind).count()
    }

    /// Load every readable record of one kind, in key order.
    ///
    /// Documents that fail to load are logged and skipped.
    pub fn scan(&self, kind: MemoryKind) -> Result<Vec<MemoryRecord>> {
        let docs = self.docs(kind);
        let mut records = Vec::new();
        for key in docs.keys()? {
            match self.load(kind, &key) {
                Ok(Some(record)) => records.push(record),
                Ok(None) => {}
                Err(e) => warn!(kind = %kind, key = %key, error = %e, "Skipping unreadable memory"),
            }
        }
        Ok(records)
    }

    fn load(&self, kind: MemoryKind, key: &str) -> Result<Option<MemoryRecord>> {
        let Some(raw) = self.docs(kind).read(key)? else {
            return Ok(None);
        };
        let mut record: MemoryRecord = serde_json::from_str(&raw)?;
        // The storage key is the identity; a stale or missing `id` field is ignored.
        record.id = key.to_string();
        record.kind = kind;
        Ok(Some(record))
    }

    fn persist(&self, record: &MemoryRecord) -> Result<()> {
        let json = serde_json::to_string_pretty(record)?;
        self.docs(record.kind).write(&record.id, &json)
    }
}
