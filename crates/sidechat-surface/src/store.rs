//! Persisted JSON documents.
//!
//! Custom selector overrides, custom platform entries and the profile store
//! are kept as small, human-inspectable JSON documents addressed by name.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// Custom selector overrides, keyed by hostname.
pub const CUSTOM_SELECTORS_DOC: &str = "custom-selectors.json";
/// User-added platform entries, keyed by generated id.
pub const CUSTOM_PLATFORMS_DOC: &str = "custom-platforms.json";
/// Profile records plus the active profile id.
pub const PROFILES_DOC: &str = "profiles.json";

/// Document store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::Io(_) => "io_failed",
            StoreError::Serialization(_) => "serialization_failed",
        }
    }
}

/// Read/write access to named JSON documents.
pub trait DocumentStore: Send + Sync {
    /// Load a document; `None` when it was never written.
    fn load(&self, name: &str) -> Result<Option<Value>, StoreError>;

    /// Replace a document.
    fn save(&self, name: &str, document: &Value) -> Result<(), StoreError>;
}

/// Documents stored as pretty-printed files in one directory.
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }
}

impl DocumentStore for JsonFileStore {
    fn load(&self, name: &str) -> Result<Option<Value>, StoreError> {
        let content = match fs::read_to_string(self.path_for(name)) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&content)?))
    }

    fn save(&self, name: &str, document: &Value) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(name);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(document)?)?;
        fs::rename(&tmp, &path)?;
        debug!("Saved document {}", path.display());
        Ok(())
    }
}

/// In-memory document store.
#[derive(Default)]
pub struct MemoryDocumentStore {
    docs: RwLock<HashMap<String, Value>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn load(&self, name: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.docs.read().get(name).cloned())
    }

    fn save(&self, name: &str, document: &Value) -> Result<(), StoreError> {
        self.docs.write().insert(name.to_string(), document.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_file_store_missing_document() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        assert!(store.load(PROFILES_DOC).unwrap().is_none());
    }

    #[test]
    fn test_file_store_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("nested"));
        let doc = json!({"chatgpt.com": {"input": "#prompt-textarea"}});

        store.save(CUSTOM_SELECTORS_DOC, &doc).unwrap();
        assert_eq!(store.load(CUSTOM_SELECTORS_DOC).unwrap(), Some(doc));
        assert!(!dir.path().join("nested").join("custom-selectors.json.tmp").exists());
    }

    #[test]
    fn test_file_store_corrupt_document() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(PROFILES_DOC), "{not json").unwrap();
        let store = JsonFileStore::new(dir.path());
        let err = store.load(PROFILES_DOC).unwrap_err();
        assert!(matches!(err, StoreError::Serialization(_)));
        assert_eq!(err.code(), "serialization_failed");
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryDocumentStore::new();
        store.save("a.json", &json!([1, 2])).unwrap();
        assert_eq!(store.load("a.json").unwrap(), Some(json!([1, 2])));
        assert!(store.load("b.json").unwrap().is_none());
    }
}
