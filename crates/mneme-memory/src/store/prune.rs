//! Retention and capacity enforcement.
//!
//! Episodic: once over the cap, records past the retention window go
//! first, then the oldest remaining until the cap holds.
//!
//! Non-episodic: once over the cap, the records with the fewest hooks go
//! first (ties in scan order) until the cap holds.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use super::MemoryStore;
use crate::error::Result;
use crate::types::{MemoryKind, MemoryRecord};

/// What one prune pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneReport {
    /// Readable records considered.
    pub examined: usize,
    /// Ids removed, in deletion order.
    pub deleted: Vec<String>,
    /// Ids whose deletion failed, with the error.
    pub failed: Vec<(String, String)>,
}

impl PruneReport {
    pub fn is_noop(&self) -> bool {
        self.deleted.is_empty() && self.failed.is_empty()
    }
}

impl MemoryStore {
    /// Prune one kind against the current clock.
    pub fn prune(&self, kind: MemoryKind) -> Result<PruneReport> {
        self.prune_at(kind, Utc::now())
    }

    /// Prune one kind as if the current time were `now`.
    pub fn prune_at(&self, kind: MemoryKind, now: DateTime<Utc>) -> Result<PruneReport> {
        let cap = match kind {
            MemoryKind::Episodic => self.config.max_episodic,
            MemoryKind::NonEpisodic => self.config.max_non_episodic,
        };
        if self.count(kind)? <= cap {
            return Ok(PruneReport::default());
        }

        let records = self.scan(kind)?;
        let mut report = PruneReport {
            examined: records.len(),
            ..Default::default()
        };
        let victims = match kind {
            MemoryKind::Episodic => self.episodic_victims(records, cap, now),
            MemoryKind::NonEpisodic => non_episodic_victims(records, cap),
        };

        for id in victims {
            match self.docs(kind).remove(&id) {
                Ok(_) => {
                    debug!(id = %id, kind = %kind, "Pruned memory");
                    report.deleted.push(id);
                }
                Err(e) => {
                    warn!(id = %id, kind = %kind, error = %e, "Failed to prune memory");
                    report.failed.push((id, e.to_string()));
                }
            }
        }

        info!(
            kind = %kind,
            examined = report.examined,
            deleted = report.deleted.len(),
            failed = report.failed.len(),
            "Pruned memories"
        );
        Ok(report)
    }

    /// Expired records, then the oldest survivors beyond the cap.
    fn episodic_victims(
        &self,
        mut records: Vec<MemoryRecord>,
        cap: usize,
        now: DateTime<Utc>,
    ) -> Vec<String> {
        records.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
        let cutoff = now - Duration::days(self.config.retention_days);

        let (expired, kept): (Vec<_>, Vec<_>) =
            records.into_iter().partition(|r| r.timestamp < cutoff);
        let overflow = kept.len().saturating_sub(cap);

        expired
            .into_iter()
            .chain(kept.into_iter().take(overflow))
            .map(|r| r.id)
            .collect()
    }
}

/// Fewest hooks first; the stable sort keeps scan order among ties.
fn non_episodic_victims(mut records: Vec<MemoryRecord>, cap: usize) -> Vec<String> {
    let excess = records.len().saturating_sub(cap);
    records.sort_by_key(|r| r.hooks.len());
    records.into_iter().take(excess).map(|r| r.id).collect()
}
