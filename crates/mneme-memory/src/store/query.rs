//! Filtered reads over one record kind.

use super::MemoryStore;
use crate::date_filter::DateFilter;
use crate::error::Result;
use crate::types::{MemoryKind, MemoryRecord};

// ─────────────────────────────────────────────────────────────────────────────
// Memory Query
// ─────────────────────────────────────────────────────────────────────────────

/// Query parameters for [`MemoryStore::query`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryQuery {
    pub kind: MemoryKind,
    /// Match records sharing at least one hook (case-insensitive).
    /// `None` or an empty list applies no hook filter.
    pub hooks: Option<Vec<String>>,
    pub date_filter: Option<DateFilter>,
    /// Applied after filtering and sorting.
    pub max_count: Option<usize>,
}

impl MemoryQuery {
    pub fn new(kind: MemoryKind) -> Self {
        Self {
            kind,
            hooks: None,
            date_filter: None,
            max_count: None,
        }
    }

    pub fn episodic() -> Self {
        Self::new(MemoryKind::Episodic)
    }

    pub fn non_episodic() -> Self {
        Self::new(MemoryKind::NonEpisodic)
    }

    pub fn with_hooks<I, S>(mut self, hooks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hooks = Some(hooks.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_date_filter(mut self, filter: DateFilter) -> Self {
        self.date_filter = Some(filter);
        self
    }

    pub fn with_max_count(mut self, max_count: usize) -> Self {
        self.max_count = Some(max_count);
        self
    }

    fn accepts(&self, record: &MemoryRecord) -> bool {
        if let Some(hooks) = &self.hooks
            && !hooks.is_empty()
            && !record.matches_any_hook(hooks)
        {
            return false;
        }
        if let Some(filter) = &self.date_filter
            && !filter.matches(record.timestamp)
        {
            return false;
        }
        true
    }
}

impl MemoryStore {
    /// Records of `query.kind` passing the hook and date filters.
    ///
    /// Episodic results are newest first. Non-episodic results keep scan
    /// order.
    pub fn query(&self, query: &MemoryQuery) -> Result<Vec<MemoryRecord>> {
        let mut records: Vec<MemoryRecord> = self
            .scan(query.kind)?
            .into_iter()
            .filter(|r| query.accepts(r))
            .collect();

        if query.kind == MemoryKind::Episodic {
            records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        }
        if let Some(max) = query.max_count {
            records.truncate(max);
        }
        Ok(records)
    }
}
