//! Validation and normalization of record data.
//!
//! This module provides:
//! - Hook normalization (lowercase, trimmed, de-duplicated)
//! - Content checks for memory records
//! - Concept name normalization
//! - Storage key checks

// ─────────────────────────────────────────────────────────────────────────────
// Validation Error
// ─────────────────────────────────────────────────────────────────────────────

/// Specific validation error types for memory data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Memory content is empty.
    #[error("memory content is empty")]
    EmptyContent,

    /// A non-episodic memory carries no hooks after normalization.
    #[error("non-episodic memory has no hooks")]
    EmptyHooks,

    /// Concept name is empty after trimming.
    #[error("concept name is empty")]
    EmptyConceptName,

    /// Storage key would escape its directory or is empty.
    #[error("invalid storage key: {0:?}")]
    InvalidKey(String),
}

// ─────────────────────────────────────────────────────────────────────────────
// Hooks
// ─────────────────────────────────────────────────────────────────────────────

/// Normalize a hook list: trim, lowercase, drop empties and duplicates.
///
/// First occurrence order is preserved.
pub fn normalize_hooks<I, S>(hooks: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for hook in hooks {
        let hook = hook.as_ref().trim().to_lowercase();
        if !hook.is_empty() && !out.contains(&hook) {
            out.push(hook);
        }
    }
    out
}

// ─────────────────────────────────────────────────────────────────────────────
// Content and Names
// ─────────────────────────────────────────────────────────────────────────────

/// Reject blank memory content.
pub fn validate_content(content: &str) -> Result<(), ValidationError> {
    if content.trim().is_empty() {
        return Err(ValidationError::EmptyContent);
    }
    Ok(())
}

/// Normalize a concept name to its primary-key form.
pub fn normalize_concept_name(name: &str) -> Result<String, ValidationError> {
    let name = name.trim().to_lowercase();
    if name.is_empty() {
        return Err(ValidationError::EmptyConceptName);
    }
    Ok(name)
}

/// Keys become file names, so they must be a single path component.
pub fn validate_key(key: &str) -> Result<(), ValidationError> {
    let bad = key.is_empty()
        || key == "."
        || key == ".."
        || key.contains(['/', '\\', '\0']);
    if bad {
        return Err(ValidationError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// Reduce free text to a file-name-safe slug (`a-z0-9_`).
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut last_underscore = false;
    for c in text.trim().to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
            last_underscore = false;
        } else if !last_underscore && !slug.is_empty() {
            slug.push('_');
            last_underscore = true;
        }
    }
    while slug.ends_with('_') {
        slug.pop();
    }
    slug
}
