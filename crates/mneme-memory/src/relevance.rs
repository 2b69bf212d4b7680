//! Relevance retrieval: pick the few memories worth showing for a query.
//!
//! ```text
//! query ──► hooks (extractor ∪ keywords ∪ themes ∪ temporal hooks)
//!   │
//!   ├─ specific date? ──► day scan over both kinds ──► (rank if too many)
//!   │
//!   └─ hook query over both kinds
//!        └─ empty + temporal intent ──► most-recent broadening scan
//!             └─ over max_memories ──► oracle rank ──► truncate
//! ```
//!
//! Ranking never fails the request: any oracle problem keeps the
//! candidates in their original order.

use chrono::{NaiveDate, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

use mneme_llm::SharedOracle;

use crate::date_filter::{TemporalHint, detect_temporal};
use crate::error::Result;
use crate::hooks::HookExtractor;
use crate::store::{MemoryQuery, MemoryStore};
use crate::types::{MemoryKind, MemoryRecord};
use crate::validation::normalize_hooks;

/// Hooks added to every query with temporal intent.
const TEMPORAL_HOOKS: [&str; 4] = ["conversation", "discussion", "memory", "recall"];

/// Retrieval limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelevanceConfig {
    /// Target result size.
    pub max_memories: usize,
    /// Episodic records taken by the broadening scan.
    pub broaden_episodic: usize,
    /// Non-episodic records taken by the broadening scan.
    pub broaden_non_episodic: usize,
}

impl Default for RelevanceConfig {
    fn default() -> Self {
        Self {
            max_memories: 5,
            broaden_episodic: 20,
            broaden_non_episodic: 10,
        }
    }
}

/// Upstream extraction results folded into the hook set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryHints {
    pub keywords: Vec<String>,
    pub themes: Vec<String>,
}

/// Selects and orders memories for a query.
pub struct Relevancer {
    store: Arc<MemoryStore>,
    extractor: HookExtractor,
    oracle: Option<SharedOracle>,
    config: RelevanceConfig,
}

impl Relevancer {
    pub fn new(store: Arc<MemoryStore>, extractor: HookExtractor, config: RelevanceConfig) -> Self {
        Self {
            store,
            extractor,
            oracle: None,
            config,
        }
    }

    /// Use `oracle` for ranking.
    pub fn with_oracle(mut self, oracle: SharedOracle) -> Self {
        self.oracle = Some(oracle);
        self
    }

    pub fn config(&self) -> &RelevanceConfig {
        &self.config
    }

    /// At most `max_memories` records relevant to `query`.
    ///
    /// Storage problems are logged and yield an empty result.
    pub async fn retrieve(&self, query: &str, hints: &QueryHints) -> Vec<MemoryRecord> {
        let hint = detect_temporal(query, Utc::now().date_naive());
        match self.retrieve_with(query, hints, &hint).await {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "Memory retrieval failed");
                Vec::new()
            }
        }
    }

    async fn retrieve_with(
        &self,
        query: &str,
        hints: &QueryHints,
        hint: &TemporalHint,
    ) -> Result<Vec<MemoryRecord>> {
        let max = self.config.max_memories;

        if let Some(day) = hint.specific_date {
            let on_day = self.records_on(day)?;
            if !on_day.is_empty() {
                debug!(day = %day, count = on_day.len(), "Found memories for specific date");
                if on_day.len() <= max {
                    return Ok(on_day);
                }
                return Ok(self.rank_and_truncate(query, on_day).await);
            }
        }

        let hooks = self.query_hooks(query, hints, hint).await;
        let mut candidates = self.store.query(&MemoryQuery::episodic().with_hooks(hooks.clone()))?;
        candidates.extend(self.store.query(&MemoryQuery::non_episodic().with_hooks(hooks))?);

        if candidates.is_empty() && hint.is_temporal() {
            debug!("No hook matches for temporal query, broadening");
            candidates = self.store.query(
                &MemoryQuery::episodic().with_max_count(self.config.broaden_episodic),
            )?;
            candidates.extend(self.store.query(
                &MemoryQuery::non_episodic().with_max_count(self.config.broaden_non_episodic),
            )?);
        }

        if candidates.len() <= max {
            debug!(count = candidates.len(), "Retrieved memories without ranking");
            return Ok(candidates);
        }
        Ok(self.rank_and_truncate(query, candidates).await)
    }

    async fn query_hooks(&self, query: &str, hints: &QueryHints, hint: &TemporalHint) -> Vec<String> {
        let mut hooks = self.extractor.extract(query, &[]).await;
        hooks.extend(hints.keywords.iter().cloned());
        hooks.extend(hints.themes.iter().cloned());
        if hint.is_temporal() {
            hooks.extend(TEMPORAL_HOOKS.iter().map(|h| h.to_string()));
        }
        normalize_hooks(hooks)
    }

    /// Episodic (newest first) then non-episodic records stamped on `day`.
    fn records_on(&self, day: NaiveDate) -> Result<Vec<MemoryRecord>> {
        let mut records = Vec::new();
        for kind in MemoryKind::ALL {
            let query = MemoryQuery::new(kind);
            records.extend(
                self.store
                    .query(&query)?
                    .into_iter()
                    .filter(|r| r.timestamp.date_naive() == day),
            );
        }
        Ok(records)
    }

    async fn rank_and_truncate(&self, query: &str, candidates: Vec<MemoryRecord>) -> Vec<MemoryRecord> {
        let mut ranked = self.rank(query, candidates).await;
        ranked.truncate(self.config.max_memories);
        ranked
    }

    /// Order candidates through the oracle, keeping original order on failure.
    pub async fn rank(&self, query: &str, candidates: Vec<MemoryRecord>) -> Vec<MemoryRecord> {
        let Some(oracle) = &self.oracle else {
            return candidates;
        };

        let lines: Vec<String> = candidates.iter().map(candidate_line).collect();
        match oracle.rank_by_relevance(query, &lines).await {
            Ok(indices) => {
                let order = rank_order(&indices, candidates.len());
                debug!(ranked = indices.len(), candidates = candidates.len(), "Ranked memories");
                let mut slots: Vec<Option<MemoryRecord>> = candidates.into_iter().map(Some).collect();
                order.into_iter().filter_map(|i| slots[i].take()).collect()
            }
            Err(e) => {
                warn!(error = %e, "Ranking failed, keeping original order");
                candidates
            }
        }
    }
}

/// `(from YYYY-MM-DD HH:MM) text` for the ranking prompt.
pub fn candidate_line(record: &MemoryRecord) -> String {
    format!(
        "(from {}) {}",
        record.timestamp.format("%Y-%m-%d %H:%M"),
        record.display_text()
    )
}

/// Turn 1-based oracle indices into a full 0-based permutation.
///
/// Out-of-range and repeated indices are dropped; unranked positions
/// follow in original order.
pub fn rank_order(indices: &[usize], len: usize) -> Vec<usize> {
    let mut seen = HashSet::new();
    let mut order: Vec<usize> = indices
        .iter()
        .filter(|&&i| i >= 1 && i <= len)
        .map(|&i| i - 1)
        .filter(|i| seen.insert(*i))
        .collect();
    order.extend((0..len).filter(|i| !seen.contains(i)));
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::HookConfig;
    use crate::store::StoreConfig;
    use crate::types::NewMemory;
    use chrono::{Duration, TimeZone};
    use mneme_llm::{Capability, LlmOracle, MockBackend, OracleConfig, ScriptedOracle};

    fn store_with_pets(n: usize) -> Arc<MemoryStore> {
        let store = MemoryStore::in_memory(StoreConfig::default());
        let now = Utc::now();
        for i in 0..n {
            store
                .store_episodic(
                    NewMemory::new(format!("User: pet story {i}"))
                        .with_hooks(["pets"])
                        .with_timestamp(now - Duration::minutes(i as i64)),
                )
                .unwrap();
        }
        Arc::new(store)
    }

    fn relevancer(store: Arc<MemoryStore>, oracle: Option<Arc<ScriptedOracle>>) -> Relevancer {
        let relevancer = Relevancer::new(
            store,
            HookExtractor::new(HookConfig::default()),
            RelevanceConfig::default(),
        );
        match oracle {
            Some(oracle) => relevancer.with_oracle(oracle),
            None => relevancer,
        }
    }

    fn pets_hint() -> QueryHints {
        QueryHints {
            keywords: vec!["pets".into()],
            themes: vec![],
        }
    }

    #[test]
    fn test_rank_order_sanitizes() {
        assert_eq!(rank_order(&[3, 1], 4), vec![2, 0, 1, 3]);
        assert_eq!(rank_order(&[9, 0, 2, 2], 3), vec![1, 0, 2]);
        assert_eq!(rank_order(&[], 2), vec![0, 1]);
    }

    #[test]
    fn test_candidate_line_prefers_summary() {
        let ts = Utc.with_ymd_and_hms(2025, 4, 13, 9, 5, 0).unwrap();
        let store = MemoryStore::in_memory(StoreConfig::default());
        let record = store
            .store_episodic(
                NewMemory::new("User: long text")
                    .with_summary("short")
                    .with_timestamp(ts),
            )
            .unwrap();
        assert_eq!(candidate_line(&record), "(from 2025-04-13 09:05) short");
    }

    #[tokio::test]
    async fn test_small_result_returned_unranked() {
        let oracle = Arc::new(ScriptedOracle::new().with_ranking(vec![2, 1]));
        let r = relevancer(store_with_pets(3), Some(oracle.clone()));
        let found = r.retrieve("tell me about pets", &pets_hint()).await;
        assert_eq!(found.len(), 3);
        assert_eq!(oracle.calls(Capability::Rank), 0);
    }

    #[tokio::test]
    async fn test_oracle_ranking_applied_then_truncated() {
        let oracle = Arc::new(ScriptedOracle::new().with_ranking(vec![7, 42, 2]));
        let r = relevancer(store_with_pets(8), Some(oracle.clone()));
        let found = r.retrieve("tell me about pets", &pets_hint()).await;

        assert_eq!(found.len(), 5);
        assert_eq!(found[0].content, "User: pet story 6");
        assert_eq!(found[1].content, "User: pet story 1");
        assert_eq!(found[2].content, "User: pet story 0");
        assert_eq!(found[3].content, "User: pet story 2");
        assert_eq!(oracle.calls(Capability::Rank), 1);
    }

    #[tokio::test]
    async fn test_unusable_ranking_keeps_original_order() {
        let oracle = Arc::new(ScriptedOracle::failing());
        let r = relevancer(store_with_pets(8), Some(oracle.clone()));
        let found = r.retrieve("tell me about pets", &pets_hint()).await;

        let contents: Vec<&str> = found.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(
            contents,
            vec![
                "User: pet story 0",
                "User: pet story 1",
                "User: pet story 2",
                "User: pet story 3",
                "User: pet story 4",
            ]
        );
        assert_eq!(oracle.calls(Capability::Rank), 1);
    }

    #[tokio::test]
    async fn test_prose_ranking_reply_keeps_original_order() {
        let backend = Arc::new(MockBackend::with_text(
            "Sorry, I can't rank these 8 memories meaningfully.",
        ));
        let oracle = LlmOracle::new(backend.clone(), OracleConfig::new("main", "fast"));
        let r = Relevancer::new(
            store_with_pets(8),
            HookExtractor::new(HookConfig::default()),
            RelevanceConfig::default(),
        )
        .with_oracle(Arc::new(oracle));

        let found = r.retrieve("tell me about pets", &pets_hint()).await;
        let contents: Vec<&str> = found.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(
            contents,
            vec![
                "User: pet story 0",
                "User: pet story 1",
                "User: pet story 2",
                "User: pet story 3",
                "User: pet story 4",
            ]
        );
        assert_eq!(backend.request_count(), 1);
    }

    #[tokio::test]
    async fn test_specific_date_scan() {
        let store = MemoryStore::in_memory(StoreConfig::default());
        let day = Utc.with_ymd_and_hms(2025, 4, 13, 15, 0, 0).unwrap();
        store
            .store_episodic(NewMemory::new("User: we planned a trip").with_timestamp(day))
            .unwrap();
        store
            .store_non_episodic(
                NewMemory::new("User likes Lisbon")
                    .with_hooks(["lisbon"])
                    .with_timestamp(day + Duration::hours(1)),
            )
            .unwrap();
        store
            .store_episodic(
                NewMemory::new("User: unrelated day")
                    .with_timestamp(day + Duration::days(1)),
            )
            .unwrap();

        let r = relevancer(Arc::new(store), None);
        let found = r
            .retrieve("What did we talk about on April 13, 2025?", &QueryHints::default())
            .await;
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].content, "User: we planned a trip");
        assert_eq!(found[1].content, "User likes Lisbon");
    }

    #[tokio::test]
    async fn test_temporal_query_broadens_when_hooks_miss() {
        let store = MemoryStore::in_memory(StoreConfig::default());
        store
            .store_episodic(NewMemory::new("User: hello there").with_hooks(["greeting"]))
            .unwrap();

        let r = relevancer(Arc::new(store), None);
        let found = r
            .retrieve("What was it we covered previously?", &QueryHints::default())
            .await;
        assert_eq!(found.len(), 1);

        let found = r.retrieve("Explain quantum tunnelling", &QueryHints::default()).await;
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn test_temporal_hooks_match_tagged_memories() {
        let store = MemoryStore::in_memory(StoreConfig::default());
        store
            .store_episodic(NewMemory::new("User: summary of chat").with_hooks(["conversation"]))
            .unwrap();
        store
            .store_episodic(NewMemory::new("User: other").with_hooks(["weather"]))
            .unwrap();

        let r = relevancer(Arc::new(store), None);
        let found = r.retrieve("Do you remember anything?", &QueryHints::default()).await;
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].content, "User: summary of chat");
    }
}
