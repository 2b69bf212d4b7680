//! Memory record types.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::validation::slugify;

// ─────────────────────────────────────────────────────────────────────────────
// Memory Kind
// ─────────────────────────────────────────────────────────────────────────────

/// The two record families held by the memory store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryKind {
    /// One user/assistant interaction turn.
    Episodic,
    /// A standalone factual statement.
    NonEpisodic,
}

impl MemoryKind {
    pub const ALL: [MemoryKind; 2] = [MemoryKind::Episodic, MemoryKind::NonEpisodic];

    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryKind::Episodic => "episodic",
            MemoryKind::NonEpisodic => "non_episodic",
        }
    }

    /// Directory name used under the data root.
    pub fn dir_name(&self) -> &'static str {
        self.as_str()
    }
}

impl std::fmt::Display for MemoryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MemoryKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "episodic" => Ok(MemoryKind::Episodic),
            "non_episodic" | "nonepisodic" | "fact" => Ok(MemoryKind::NonEpisodic),
            other => Err(format!("unknown memory kind: {other}")),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Memory Record
// ─────────────────────────────────────────────────────────────────────────────

/// A persisted memory.
///
/// Fields this type does not know about are kept in `extra` and written
/// back unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// Storage key. Filled from the file name when the document omits it.
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type")]
    pub kind: MemoryKind,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default)]
    pub hooks: Vec<String>,
    #[serde(deserialize_with = "lenient_timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl MemoryRecord {
    /// Summary if present and non-blank, else the full content.
    pub fn display_text(&self) -> &str {
        match self.summary.as_deref() {
            Some(summary) if !summary.trim().is_empty() => summary,
            _ => &self.content,
        }
    }

    /// Case-insensitive match against any of `hooks`.
    pub fn matches_any_hook(&self, hooks: &[String]) -> bool {
        self.hooks.iter().any(|own| {
            let own = own.to_lowercase();
            hooks.iter().any(|h| h.trim().to_lowercase() == own)
        })
    }
}

/// Accepts RFC 3339, or a naive ISO timestamp taken as UTC.
pub(crate) fn lenient_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("unrecognised timestamp: {raw}")))
}

/// Parse a stored timestamp string.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

// ─────────────────────────────────────────────────────────────────────────────
// New Memory
// ─────────────────────────────────────────────────────────────────────────────

/// A record about to be written. The store fills in what is missing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewMemory {
    pub id: Option<String>,
    pub content: String,
    pub summary: Option<String>,
    pub hooks: Vec<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub conversation_id: Option<String>,
}

impl NewMemory {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    pub fn with_hooks<I, S>(mut self, hooks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hooks = hooks.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn with_conversation_id(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }
}

/// Generate a unique, sortable record id.
///
/// Episodic: `episodic_<YYYYmmdd_HHMMSS_ffffff>_<8 hex>`.
/// Non-episodic: `non_episodic_<hook slug>_<timestamp>_<8 hex>`.
pub fn generate_id(kind: MemoryKind, timestamp: DateTime<Utc>, primary_hook: Option<&str>) -> String {
    let stamp = timestamp.format("%Y%m%d_%H%M%S_%6f");
    let simple = Uuid::new_v4().simple().to_string();
    let suffix = &simple[..8];
    match kind {
        MemoryKind::Episodic => format!("episodic_{stamp}_{suffix}"),
        MemoryKind::NonEpisodic => {
            let slug: String = primary_hook
                .map(slugify)
                .unwrap_or_default()
                .chars()
                .take(30)
                .collect();
            let slug = if slug.is_empty() { "fact".to_string() } else { slug };
            format!("non_episodic_{slug}_{stamp}_{suffix}")
        }
    }
}
