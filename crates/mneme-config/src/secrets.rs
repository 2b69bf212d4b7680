//! API key resolution.
//!
//! Resolution order:
//! 1. Environment variable (backend-specific)
//! 2. Config file (with warning at load time)

use crate::{Backend, ConfigError, LlmConfig, Result};

/// Result of API key resolution with provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSecret {
    /// The secret value.
    pub value: String,
    /// Where the secret was found.
    pub source: SecretSource,
}

/// Where a secret was resolved from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretSource {
    /// Environment variable.
    EnvVar(String),
    /// Config file (plaintext, not recommended).
    ConfigFile,
}

impl std::fmt::Display for SecretSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SecretSource::EnvVar(var) => write!(f, "env var {}", var),
            SecretSource::ConfigFile => write!(f, "config file (plaintext)"),
        }
    }
}

/// Resolve an API key for a backend.
pub fn resolve_api_key(backend: &Backend, config_value: Option<&str>) -> Option<ResolvedSecret> {
    let env_var = backend.env_var();
    if let Ok(value) = std::env::var(env_var)
        && !value.is_empty()
    {
        return Some(ResolvedSecret {
            value,
            source: SecretSource::EnvVar(env_var.to_string()),
        });
    }

    config_value
        .filter(|v| !v.is_empty())
        .map(|v| ResolvedSecret {
            value: v.to_string(),
            source: SecretSource::ConfigFile,
        })
}

/// Resolve the key for an `[llm]` section, failing when none is available.
pub fn require_api_key(llm: &LlmConfig) -> Result<ResolvedSecret> {
    let backend = llm.effective_backend();
    resolve_api_key(&backend, llm.api_key.as_deref()).ok_or_else(|| ConfigError::ApiKeyNotFound {
        backend: backend.to_string(),
        env_var: backend.env_var().to_string(),
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        // SAFETY: every caller is #[serial].
        unsafe { std::env::remove_var("ANTHROPIC_API_KEY") };
    }

    #[test]
    #[serial]
    fn test_resolve_from_config_value() {
        clear_env();
        let resolved = resolve_api_key(&Backend::Anthropic, Some("my-key")).unwrap();
        assert_eq!(resolved.value, "my-key");
        assert_eq!(resolved.source, SecretSource::ConfigFile);
    }

    #[test]
    #[serial]
    fn test_env_var_wins_over_config() {
        unsafe { std::env::set_var("ANTHROPIC_API_KEY", "env-key") };
        let resolved = resolve_api_key(&Backend::Anthropic, Some("config-key")).unwrap();
        clear_env();
        assert_eq!(resolved.value, "env-key");
        assert_eq!(
            resolved.source,
            SecretSource::EnvVar("ANTHROPIC_API_KEY".to_string())
        );
    }

    #[test]
    #[serial]
    fn test_require_api_key_missing() {
        clear_env();
        let err = require_api_key(&LlmConfig::default()).unwrap_err();
        match err {
            ConfigError::ApiKeyNotFound { env_var, .. } => {
                assert_eq!(env_var, "ANTHROPIC_API_KEY")
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    #[serial]
    fn test_empty_config_value_is_not_a_key() {
        clear_env();
        assert!(resolve_api_key(&Backend::Anthropic, Some("")).is_none());
    }

    #[test]
    fn test_secret_source_display() {
        assert_eq!(
            SecretSource::EnvVar("ANTHROPIC_API_KEY".to_string()).to_string(),
            "env var ANTHROPIC_API_KEY"
        );
        assert_eq!(
            SecretSource::ConfigFile.to_string(),
            "config file (plaintext)"
        );
    }
}
