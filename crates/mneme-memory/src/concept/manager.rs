//! Concept persistence with an in-process node cache.

use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::node::ConceptNode;
use crate::document::{DocumentStore, FileDocumentStore, InMemoryDocumentStore};
use crate::error::{MemoryError, Result};
use crate::validation::{normalize_concept_name, slugify};

/// Storage key for a normalized concept name.
///
/// Names made only of lowercase ASCII words map to their slug
/// (`"blue sky"` → `blue_sky`). Anything else gets the first
/// [`KEY_DIGEST_LEN`] hex characters of the name's SHA-256 as a suffix.
/// Loaded nodes are checked against the requested name, so a suffix
/// collision surfaces as an error rather than a shared node.
pub fn concept_key(name: &str) -> String {
    let slug = slugify(name);
    if !slug.is_empty() && slug.replace('_', " ") == name {
        return slug;
    }
    let base = if slug.is_empty() { "concept" } else { slug.as_str() };
    let digest = sha256_hex(name);
    format!("{base}_{}", &digest[..KEY_DIGEST_LEN])
}

/// Hex characters of the digest kept in a concept key.
pub const KEY_DIGEST_LEN: usize = 16;

fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// Reject a node stored under `name`'s key that belongs to another name.
fn ensure_named(node: ConceptNode, name: &str) -> Result<ConceptNode> {
    if node.name() == name {
        Ok(node)
    } else {
        Err(MemoryError::InvalidData(format!(
            "concept key for '{name}' holds concept '{}'",
            node.name()
        )))
    }
}

/// Owns concept identity and persistence.
///
/// Nodes handed out are copies. The cache is per process and is not
/// invalidated by other writers.
pub struct ConceptManager {
    store: Arc<dyn DocumentStore>,
    cache: Mutex<HashMap<String, ConceptNode>>,
}

impl std::fmt::Debug for ConceptManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConceptManager")
            .field("store", &self.store.location())
            .field("cached", &self.cache.lock().len())
            .finish()
    }
}

impl ConceptManager {
    /// File-backed manager over `dir`.
    pub fn open(dir: &Path) -> Result<Self> {
        Ok(Self::with_store(Arc::new(FileDocumentStore::open(dir)?)))
    }

    pub fn in_memory() -> Self {
        Self::with_store(Arc::new(InMemoryDocumentStore::new()))
    }

    pub fn with_store(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// The node for `name`, loading or creating it. New nodes are not
    /// persisted until saved.
    pub fn get_or_create(&self, name: &str) -> Result<ConceptNode> {
        let name = normalize_concept_name(name)?;
        let key = concept_key(&name);
        if let Some(node) = self.cache.lock().get(&key) {
            return ensure_named(node.clone(), &name);
        }

        let node = match self.load(&key) {
            Ok(Some(node)) => ensure_named(node, &name)?,
            Ok(None) => ConceptNode::new(name.clone()),
            Err(e) => {
                warn!(key = %key, error = %e, "Unreadable concept, starting fresh");
                ConceptNode::new(name.clone())
            }
        };
        self.cache.lock().insert(key, node.clone());
        Ok(node)
    }

    /// A known node (persisted, or cached by this manager) without creating one.
    pub fn get(&self, name: &str) -> Result<Option<ConceptNode>> {
        let name = normalize_concept_name(name)?;
        let key = concept_key(&name);
        if let Some(node) = self.cache.lock().get(&key) {
            return ensure_named(node.clone(), &name).map(Some);
        }
        let node = self.load(&key)?.map(|node| ensure_named(node, &name)).transpose()?;
        if let Some(node) = &node {
            self.cache.lock().insert(key, node.clone());
        }
        Ok(node)
    }

    /// Refresh the timestamp, persist and cache.
    pub fn save(&self, node: &mut ConceptNode) -> Result<()> {
        node.touch();
        let key = concept_key(node.name());
        let json = serde_json::to_string_pretty(node)?;
        self.store.write(&key, &json)?;
        self.cache.lock().insert(key, node.clone());
        debug!(concept = %node.name(), "Saved concept");
        Ok(())
    }

    /// Persisted nodes matching `query` on name, tag or trait.
    pub fn search(&self, query: &str) -> Result<Vec<ConceptNode>> {
        let query = query.trim().to_lowercase();
        Ok(self
            .list_all()?
            .into_iter()
            .filter(|node| node.matches(&query))
            .collect())
    }

    /// Fold `secondary` into `primary`, persist `primary`, delete `secondary`.
    ///
    /// Not commutative: the caller chooses the survivor.
    pub fn merge(&self, mut primary: ConceptNode, secondary: &ConceptNode) -> Result<ConceptNode> {
        if primary.name() == secondary.name() {
            return Err(MemoryError::InvalidData(format!(
                "cannot merge concept '{}' into itself",
                primary.name()
            )));
        }
        primary.absorb(secondary);
        self.save(&mut primary)?;
        self.delete(secondary.name())?;
        info!(primary = %primary.name(), secondary = %secondary.name(), "Merged concepts");
        Ok(primary)
    }

    /// [`ConceptManager::merge`] by name. Fails if `secondary` does not exist.
    pub fn merge_by_name(&self, primary: &str, secondary: &str) -> Result<ConceptNode> {
        let secondary_node = self
            .get(secondary)?
            .ok_or_else(|| MemoryError::NotFound(format!("concept '{}'", secondary.trim())))?;
        let primary_node = self.get_or_create(primary)?;
        self.merge(primary_node, &secondary_node)
    }

    /// Remove a node. Returns `false` if nothing was persisted under `name`.
    pub fn delete(&self, name: &str) -> Result<bool> {
        let name = normalize_concept_name(name)?;
        let key = concept_key(&name);
        self.cache.lock().remove(&key);
        let removed = self.store.remove(&key)?;
        if removed {
            info!(concept = %name, "Deleted concept");
        }
        Ok(removed)
    }

    /// Every persisted node, in key order. Unreadable documents are skipped.
    pub fn list_all(&self) -> Result<Vec<ConceptNode>> {
        let mut nodes = Vec::new();
        for key in self.store.keys()? {
            if let Some(node) = self.cache.lock().get(&key) {
                nodes.push(node.clone());
                continue;
            }
            match self.load(&key) {
                Ok(Some(node)) => {
                    self.cache.lock().insert(key, node.clone());
                    nodes.push(node);
                }
                Ok(None) => {}
                Err(e) => warn!(key = %key, error = %e, "Skipping unreadable concept"),
            }
        }
        Ok(nodes)
    }

    fn load(&self, key: &str) -> Result<Option<ConceptNode>> {
        let Some(raw) = self.store.read(key)? else {
            return Ok(None);
        };
        let mut node: ConceptNode = serde_json::from_str(&raw)?;
        let name = normalize_concept_name(node.name())?;
        node.set_name(name);
        Ok(Some(node))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_concept_key() {
        assert_eq!(concept_key("blue"), "blue");
        assert_eq!(concept_key("blue sky"), "blue_sky");
        let underscored = concept_key("blue_sky");
        assert!(underscored.starts_with("blue_sky_"));
        assert_ne!(underscored, concept_key("blue sky"));
        assert_ne!(concept_key("c++"), concept_key("c#"));
        assert!(concept_key("日本").starts_with("concept_"));
        assert_eq!(concept_key("c++").len(), "c_".len() + KEY_DIGEST_LEN);
    }

    #[test]
    fn test_symbol_names_get_distinct_nodes() {
        let dir = TempDir::new().unwrap();
        let manager = ConceptManager::open(dir.path()).unwrap();
        assert_ne!(concept_key("x-#=&*"), concept_key("x-?$^#"));

        let mut first = manager.get_or_create("x-#=&*").unwrap();
        first.add_tag("only-a");
        manager.save(&mut first).unwrap();

        let second = manager.get_or_create("x-?$^#").unwrap();
        assert_eq!(second.name(), "x-?$^#");
        assert!(second.tags().is_empty());

        let reopened = ConceptManager::open(dir.path()).unwrap();
        assert_eq!(
            reopened.get("x-#=&*").unwrap().unwrap().tags(),
            &["only-a".to_string()]
        );
        assert!(reopened.get("x-?$^#").unwrap().is_none());
    }

    #[test]
    fn test_node_under_foreign_key_is_rejected() {
        let dir = TempDir::new().unwrap();
        let node = ConceptNode::new("green".to_string());
        std::fs::write(
            dir.path().join("blue.json"),
            serde_json::to_string(&node).unwrap(),
        )
        .unwrap();

        let manager = ConceptManager::open(dir.path()).unwrap();
        assert!(matches!(
            manager.get_or_create("blue"),
            Err(MemoryError::InvalidData(_))
        ));
        assert!(matches!(manager.get("blue"), Err(MemoryError::InvalidData(_))));
    }

    #[test]
    fn test_get_or_create_is_lazy() {
        let dir = TempDir::new().unwrap();
        let manager = ConceptManager::open(dir.path()).unwrap();

        let node = manager.get_or_create("  Blue ").unwrap();
        assert_eq!(node.name(), "blue");
        assert!(manager.list_all().unwrap().is_empty());
        assert!(!dir.path().join("blue.json").exists());
    }

    #[test]
    fn test_search_scenario() {
        let dir = TempDir::new().unwrap();
        let manager = ConceptManager::open(dir.path()).unwrap();

        let mut node = manager.get_or_create("blue").unwrap();
        node.add_trait("favorite_color", "blue");
        node.add_tag("preference");
        manager.save(&mut node).unwrap();

        let found = manager.search("favorite").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name(), "blue");
        assert!(manager.search("green").unwrap().is_empty());

        // A fresh manager sees the same node from disk.
        let reopened = ConceptManager::open(dir.path()).unwrap();
        assert_eq!(reopened.search("PREFERENCE").unwrap().len(), 1);
    }

    #[test]
    fn test_mutation_without_save_is_not_persisted() {
        let manager = ConceptManager::in_memory();
        let mut node = manager.get_or_create("tea").unwrap();
        manager.save(&mut node).unwrap();

        node.add_tag("drink");
        assert!(manager.get("tea").unwrap().unwrap().tags().is_empty());
        manager.save(&mut node).unwrap();
        assert_eq!(manager.get("tea").unwrap().unwrap().tags(), &["drink".to_string()]);
    }

    #[test]
    fn test_merge_is_idempotent_and_removes_secondary() {
        let manager = ConceptManager::in_memory();

        let mut a = manager.get_or_create("automobile").unwrap();
        a.add_trait("wheels", "four");
        manager.save(&mut a).unwrap();

        let mut b = manager.get_or_create("car").unwrap();
        b.add_trait("wheels", "four");
        b.add_trait("fuel", "petrol");
        b.set_type("vehicle");
        manager.save(&mut b).unwrap();

        let merged = manager.merge(a, &b).unwrap();
        assert_eq!(merged.trait_values("wheels"), &[json!("four")]);
        assert_eq!(merged.concept_type(), "vehicle");
        assert!(manager.get("car").unwrap().is_none());

        let again = manager.merge(merged.clone(), &b).unwrap();
        assert_eq!(again.traits(), merged.traits());
        assert_eq!(again.trait_values("fuel"), &[json!("petrol")]);
        assert!(manager.get("car").unwrap().is_none());
        assert_eq!(manager.list_all().unwrap().len(), 1);
    }

    #[test]
    fn test_merge_by_name() {
        let manager = ConceptManager::in_memory();
        assert!(matches!(
            manager.merge_by_name("a", "missing"),
            Err(MemoryError::NotFound(_))
        ));

        let mut b = manager.get_or_create("b").unwrap();
        b.add_tag("t");
        manager.save(&mut b).unwrap();
        assert!(manager.merge_by_name("b", "B").is_err());

        let merged = manager.merge_by_name("a", "b").unwrap();
        assert_eq!(merged.tags(), &["t".to_string()]);
        assert_eq!(manager.get("a").unwrap().unwrap().tags(), &["t".to_string()]);
    }

    #[test]
    fn test_delete_idempotent() {
        let manager = ConceptManager::in_memory();
        let mut node = manager.get_or_create("x").unwrap();
        manager.save(&mut node).unwrap();
        assert!(manager.delete("X").unwrap());
        assert!(!manager.delete("x").unwrap());
        assert!(manager.get("x").unwrap().is_none());
    }

    #[test]
    fn test_list_all_skips_corrupt() {
        let dir = TempDir::new().unwrap();
        let manager = ConceptManager::open(dir.path()).unwrap();
        let mut node = manager.get_or_create("ok").unwrap();
        manager.save(&mut node).unwrap();
        std::fs::write(dir.path().join("bad.json"), "not json").unwrap();

        let names: Vec<String> = manager
            .list_all()
            .unwrap()
            .iter()
            .map(|n| n.name().to_string())
            .collect();
        assert_eq!(names, vec!["ok"]);
    }
}
