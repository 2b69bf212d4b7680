//! Key/value document storage underneath every record kind.
//!
//! Each store owns one namespace of JSON documents addressed by a key that
//! is a single file-name component. [`FileDocumentStore`] maps a key to
//! `<dir>/<key>.json`; [`InMemoryDocumentStore`] keeps documents in a map.
//!
//! Writes are last-write-wins on a single key. There is no locking around
//! read-modify-write sequences.

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{MemoryError, Result};
use crate::validation::validate_key;

const EXTENSION: &str = "json";

/// Get/put/delete/list over raw JSON documents.
pub trait DocumentStore: Send + Sync {
    /// Read one document. `Ok(None)` if the key does not exist.
    fn read(&self, key: &str) -> Result<Option<String>>;

    /// Create or replace a document.
    fn write(&self, key: &str, contents: &str) -> Result<()>;

    /// Remove a document. Returns `false` if it did not exist.
    fn remove(&self, key: &str) -> Result<bool>;

    /// All keys, sorted lexicographically.
    fn keys(&self) -> Result<Vec<String>>;

    /// Number of documents.
    fn count(&self) -> Result<usize> {
        Ok(self.keys()?.len())
    }

    /// Human-readable location of the namespace, for logs.
    fn location(&self) -> String;
}

// ─────────────────────────────────────────────────────────────────────────────
// File Store
// ─────────────────────────────────────────────────────────────────────────────

/// One JSON file per document in a single directory.
#[derive(Debug, Clone)]
pub struct FileDocumentStore {
    dir: PathBuf,
}

impl FileDocumentStore {
    /// Open (creating if needed) a document directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| MemoryError::io(&dir, e))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.dir.join(format!("{key}.{EXTENSION}")))
    }
}

impl DocumentStore for FileDocumentStore {
    fn read(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        match std::fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(MemoryError::io(path, e)),
        }
    }

    fn write(&self, key: &str, contents: &str) -> Result<()> {
        let path = self.path_for(key)?;
        // Write beside the target then rename, so readers never see half a file.
        let tmp = self.dir.join(format!(".{key}.{EXTENSION}.tmp"));
        std::fs::write(&tmp, contents).map_err(|e| MemoryError::io(&tmp, e))?;
        std::fs::rename(&tmp, &path).map_err(|e| MemoryError::io(&path, e))
    }

    fn remove(&self, key: &str) -> Result<bool> {
        let path = self.path_for(key)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(MemoryError::io(path, e)),
        }
    }

    fn keys(&self) -> Result<Vec<String>> {
        let entries = std::fs::read_dir(&self.dir).map_err(|e| MemoryError::io(&self.dir, e))?;
        let mut keys = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| MemoryError::io(&self.dir, e))?;
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str())
                && !stem.starts_with('.')
            {
                keys.push(stem.to_string());
            }
        }
        keys.sort();
        Ok(keys)
    }

    fn location(&self) -> String {
        self.dir.display().to_string()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// In-Memory Store
// ─────────────────────────────────────────────────────────────────────────────

/// Documents held in a sorted map. Nothing survives the process.
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    docs: Mutex<BTreeMap<String, String>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.docs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.lock().is_empty()
    }
}

impl DocumentStore for InMemoryDocumentStore {
    fn read(&self, key: &str) -> Result<Option<String>> {
        validate_key(key)?;
        Ok(self.docs.lock().get(key).cloned())
    }

    fn write(&self, key: &str, contents: &str) -> Result<()> {
        validate_key(key)?;
        self.docs.lock().insert(key.to_string(), contents.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool> {
        validate_key(key)?;
        Ok(self.docs.lock().remove(key).is_some())
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.docs.lock().keys().cloned().collect())
    }

    fn count(&self) -> Result<usize> {
        Ok(self.docs.lock().len())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_store_crud() {
        let dir = TempDir::new().unwrap();
        let store = FileDocumentStore::open(dir.path().join("docs")).unwrap();

        assert_eq!(store.read("a").unwrap(), None);
        store.write("b", "{\"v\":2}").unwrap();
        store.write("a", "{\"v\":1}").unwrap();
        assert_eq!(store.read("a").unwrap().as_deref(), Some("{\"v\":1}"));
        assert_eq!(store.keys().unwrap(), vec!["a", "b"]);

        assert!(store.remove("a").unwrap());
        assert!(!store.remove("a").unwrap());
        assert_eq!(store.keys().unwrap(), vec!["b"]);
    }

    #[test]
    fn test_file_store_ignores_foreign_files() {
        let dir = TempDir::new().unwrap();
        let store = FileDocumentStore::open(dir.path()).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "x").unwrap();
        std::fs::write(dir.path().join(".half.json.tmp"), "x").unwrap();
        store.write("real", "{}").unwrap();
        assert_eq!(store.keys().unwrap(), vec!["real"]);
    }

    #[test]
    fn test_rejects_path_keys() {
        let dir = TempDir::new().unwrap();
        let store = FileDocumentStore::open(dir.path()).unwrap();
        assert!(store.write("../escape", "{}").is_err());
        assert!(InMemoryDocumentStore::new().write("a/b", "{}").is_err());
    }

    #[test]
    fn test_in_memory_store() {
        let store = InMemoryDocumentStore::new();
        store.write("z", "1").unwrap();
        store.write("m", "2").unwrap();
        assert_eq!(store.keys().unwrap(), vec!["m", "z"]);
        assert_eq!(store.len(), 2);
        assert!(store.remove("z").unwrap());
        assert!(!store.remove("z").unwrap());
    }
}
