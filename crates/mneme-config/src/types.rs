//! Configuration types mapped from TOML.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, Result};

/// Application name used for platform directory resolution.
pub const APP_NAME: &str = "mneme";

/// Default main model for response generation, ranking and summarization.
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// Default fast model for hooks, tone and extraction.
pub const DEFAULT_FAST_MODEL: &str = "claude-3-5-haiku-20241022";

// ─────────────────────────────────────────────────────────────────────────────
// Root Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// All sections are optional so that partial configs (e.g., project-local
/// overrides) can be loaded and merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MnemeConfig {
    /// Text oracle backend configuration.
    pub llm: Option<LlmConfig>,

    /// Memory subsystem configuration.
    pub memory: Option<MemoryConfig>,

    /// Log file configuration.
    pub logging: Option<LoggingConfig>,
}

impl MnemeConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merge another config on top of this one (other takes priority).
    pub fn merge(&mut self, other: MnemeConfig) {
        if other.llm.is_some() {
            self.llm = other.llm;
        }

        if other.memory.is_some() {
            self.memory = other.memory;
        }

        if other.logging.is_some() {
            self.logging = other.logging;
        }
    }

    /// The `[llm]` section, or defaults when absent.
    pub fn llm(&self) -> LlmConfig {
        self.llm.clone().unwrap_or_default()
    }

    /// The `[memory]` section, or defaults when absent.
    pub fn memory(&self) -> MemoryConfig {
        self.memory.clone().unwrap_or_default()
    }

    /// The `[logging]` section, or defaults when absent.
    pub fn logging(&self) -> LoggingConfig {
        self.logging.clone().unwrap_or_default()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// LLM Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration for the text oracle's LLM backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Backend provider.
    pub backend: Option<Backend>,
    /// Main model identifier.
    pub model: Option<String>,
    /// Cheaper model used for extraction-style calls.
    pub fast_model: Option<String>,
    /// Custom API base URL (for proxies, custom endpoints).
    pub base_url: Option<String>,
    /// API key (prefer the env var; warns if set here).
    pub api_key: Option<String>,
    /// Maximum retry attempts for rate-limited requests.
    pub retry_max: Option<u32>,
    /// Initial backoff between rate-limit retries in milliseconds.
    pub retry_backoff_ms: Option<u64>,
    /// Request timeout in seconds.
    pub timeout_secs: Option<u64>,
    /// Token ceiling for generated responses.
    pub max_tokens: Option<u32>,
}

impl LlmConfig {
    /// Returns true if an API key is stored directly in the config file.
    pub fn has_plaintext_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Configured backend, defaulting to Anthropic.
    pub fn effective_backend(&self) -> Backend {
        self.backend.unwrap_or_default()
    }

    pub fn effective_model(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    pub fn effective_fast_model(&self) -> &str {
        self.fast_model.as_deref().unwrap_or(DEFAULT_FAST_MODEL)
    }

    pub fn effective_retry_max(&self) -> u32 {
        self.retry_max.unwrap_or(3)
    }

    pub fn effective_retry_backoff_ms(&self) -> u64 {
        self.retry_backoff_ms.unwrap_or(2000)
    }

    pub fn effective_timeout_secs(&self) -> u64 {
        self.timeout_secs.unwrap_or(60)
    }

    pub fn effective_max_tokens(&self) -> u32 {
        self.max_tokens.unwrap_or(1024)
    }
}

/// Supported LLM backend providers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Anthropic,
}

impl Backend {
    /// Environment variable name for this backend's API key.
    pub fn env_var(&self) -> &'static str {
        match self {
            Backend::Anthropic => "ANTHROPIC_API_KEY",
        }
    }

    /// Human-readable name.
    pub fn display_name(&self) -> &'static str {
        match self {
            Backend::Anthropic => "Anthropic",
        }
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Memory Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration for the memory subsystem.
///
/// Each component receives the slice it needs at construction; nothing reads
/// these values from global state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Root directory for memories, concepts and conversations.
    /// Defaults to the platform data directory.
    pub data_dir: Option<PathBuf>,
    /// Episodic record cap before pruning kicks in.
    pub max_episodic: usize,
    /// Non-episodic record cap before pruning kicks in.
    pub max_non_episodic: usize,
    /// Episodic records older than this are pruned once over cap.
    pub retention_days: i64,
    /// Maximum hooks per record.
    pub max_hooks: usize,
    /// Minimum hook length in characters.
    pub min_hook_length: usize,
    /// Maximum hook length in characters.
    pub max_hook_length: usize,
    /// Maximum memories returned by relevance retrieval.
    pub max_memories: usize,
    /// Character budget for record summaries.
    pub summary_max_length: usize,
    /// Episodic records fetched when broadening a temporal query.
    pub broaden_episodic: usize,
    /// Non-episodic records fetched when broadening a temporal query.
    pub broaden_non_episodic: usize,
    /// Concepts updated within this window are presented as new information.
    pub concept_freshness_secs: i64,
    /// Index concepts from each recorded interaction.
    pub index_concepts: bool,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            max_episodic: 1000,
            max_non_episodic: 500,
            retention_days: 30,
            max_hooks: 10,
            min_hook_length: 2,
            max_hook_length: 30,
            max_memories: 5,
            summary_max_length: 200,
            broaden_episodic: 20,
            broaden_non_episodic: 10,
            concept_freshness_secs: 60,
            index_concepts: false,
        }
    }
}

impl MemoryConfig {
    /// Resolve the data directory: explicit setting, then platform default.
    pub fn resolve_data_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.data_dir {
            return Ok(dir.clone());
        }
        dirs::data_dir()
            .map(|d| d.join(APP_NAME))
            .ok_or(ConfigError::NoDataDir)
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<()> {
        if self.min_hook_length > self.max_hook_length {
            return Err(ConfigError::InvalidValue {
                field: "memory.min_hook_length".to_string(),
                reason: format!(
                    "{} exceeds max_hook_length {}",
                    self.min_hook_length, self.max_hook_length
                ),
            });
        }
        if self.max_hooks == 0 {
            return Err(ConfigError::InvalidValue {
                field: "memory.max_hooks".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.max_memories == 0 {
            return Err(ConfigError::InvalidValue {
                field: "memory.max_memories".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Logging Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Log file settings for the binary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Write JSON logs to a daily-rotated file.
    pub file_logging: bool,
    /// Directory for log files. Defaults to `<data_dir>/logs`.
    pub log_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file_logging: true,
            log_dir: None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
