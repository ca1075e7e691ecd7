//! Per-hostname selector overrides learned by the element picker.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::guard::HostPattern;
use crate::registry::SubmissionMode;
use crate::script::{validate_selector, SelectorError};
use crate::store::{DocumentStore, StoreError, CUSTOM_SELECTORS_DOC};

/// Replacement selectors for one hostname.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectorOverride {
    pub hostname: String,
    pub input_selector: String,
    pub submit_selector: String,
    pub submission_mode: SubmissionMode,
    /// Element that must be present before the input is used.
    pub wait_for: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl SelectorOverride {
    pub fn new(
        hostname: impl Into<String>,
        input_selector: impl Into<String>,
        submit_selector: impl Into<String>,
        submission_mode: SubmissionMode,
    ) -> Self {
        Self {
            hostname: hostname.into().to_ascii_lowercase(),
            input_selector: input_selector.into(),
            submit_selector: submit_selector.into(),
            submission_mode,
            wait_for: None,
            updated_at: Utc::now(),
        }
    }

    /// Whether both selectors are present, the precondition for overriding a platform.
    pub fn is_complete(&self) -> bool {
        !self.input_selector.trim().is_empty() && !self.submit_selector.trim().is_empty()
    }
}

/// On-disk record: `{ input, button, waitFor, submitMode, timestamp }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredOverride {
    input: String,
    button: String,
    #[serde(default)]
    wait_for: Option<String>,
    #[serde(default)]
    submit_mode: SubmissionMode,
    #[serde(default)]
    timestamp: i64,
}

impl StoredOverride {
    fn into_override(self, hostname: &str) -> SelectorOverride {
        SelectorOverride {
            hostname: hostname.to_string(),
            input_selector: self.input,
            submit_selector: self.button,
            submission_mode: self.submit_mode,
            wait_for: self.wait_for,
            updated_at: Utc
                .timestamp_millis_opt(self.timestamp)
                .single()
                .unwrap_or_default(),
        }
    }
}

impl From<&SelectorOverride> for StoredOverride {
    fn from(o: &SelectorOverride) -> Self {
        Self {
            input: o.input_selector.clone(),
            button: o.submit_selector.clone(),
            wait_for: o.wait_for.clone(),
            submit_mode: o.submission_mode,
            timestamp: o.updated_at.timestamp_millis(),
        }
    }
}

/// Override store errors.
#[derive(Debug, Error)]
pub enum OverrideError {
    #[error("Invalid hostname: {0}")]
    InvalidHostname(String),

    #[error("Invalid selector: {0}")]
    InvalidSelector(#[from] SelectorError),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

impl OverrideError {
    pub fn code(&self) -> &'static str {
        match self {
            OverrideError::InvalidHostname(_) => "invalid_hostname",
            OverrideError::InvalidSelector(e) => e.code(),
            OverrideError::Storage(_) => "storage_failed",
        }
    }
}

/// Persisted hostname → override map.
pub struct SelectorOverrideStore {
    store: Arc<dyn DocumentStore>,
    max_selector_len: usize,
    entries: RwLock<BTreeMap<String, SelectorOverride>>,
}

impl SelectorOverrideStore {
    /// Load persisted overrides. Records failing selector validation are dropped.
    pub fn load(store: Arc<dyn DocumentStore>, max_selector_len: usize) -> Result<Self, StoreError> {
        let mut entries = BTreeMap::new();

        if let Some(doc) = store.load(CUSTOM_SELECTORS_DOC)? {
            let records: BTreeMap<String, serde_json::Value> = serde_json::from_value(doc)?;
            for (hostname, record) in records {
                let stored = match serde_json::from_value::<StoredOverride>(record) {
                    Ok(stored) => stored,
                    Err(e) => {
                        warn!("Skipping corrupt selector override for {}: {}", hostname, e);
                        continue;
                    }
                };
                let candidate = stored.into_override(&hostname.to_ascii_lowercase());
                match Self::check(&candidate, max_selector_len) {
                    Ok(()) => {
                        entries.insert(candidate.hostname.clone(), candidate);
                    }
                    Err(e) => warn!("Dropping unsafe selector override for {}: {}", hostname, e),
                }
            }
        }

        Ok(Self {
            store,
            max_selector_len,
            entries: RwLock::new(entries),
        })
    }

    fn check(candidate: &SelectorOverride, max_len: usize) -> Result<(), OverrideError> {
        if HostPattern::parse(&candidate.hostname) != Some(HostPattern::Exact(candidate.hostname.clone())) {
            return Err(OverrideError::InvalidHostname(candidate.hostname.clone()));
        }
        validate_selector(&candidate.input_selector, max_len)?;
        validate_selector(&candidate.submit_selector, max_len)?;
        if let Some(wait_for) = &candidate.wait_for {
            validate_selector(wait_for, max_len)?;
        }
        Ok(())
    }

    pub fn get(&self, hostname: &str) -> Option<SelectorOverride> {
        self.entries.read().get(&hostname.to_ascii_lowercase()).cloned()
    }

    pub fn list(&self) -> Vec<SelectorOverride> {
        self.entries.read().values().cloned().collect()
    }

    /// Validate, store and persist an override, replacing any previous one for the host.
    pub fn set(&self, mut record: SelectorOverride) -> Result<(), OverrideError> {
        record.hostname = record.hostname.trim().to_ascii_lowercase();
        record.input_selector = record.input_selector.trim().to_string();
        record.submit_selector = record.submit_selector.trim().to_string();
        Self::check(&record, self.max_selector_len)?;

        let mut entries = self.entries.write();
        let mut next = entries.clone();
        next.insert(record.hostname.clone(), record.clone());
        self.persist(&next)?;
        *entries = next;

        info!("Saved selector override for {}", record.hostname);
        Ok(())
    }

    /// Remove an override; returns whether one existed.
    pub fn remove(&self, hostname: &str) -> Result<bool, OverrideError> {
        let key = hostname.to_ascii_lowercase();
        let mut entries = self.entries.write();
        if !entries.contains_key(&key) {
            return Ok(false);
        }
        let mut next = entries.clone();
        next.remove(&key);
        self.persist(&next)?;
        *entries = next;

        info!("Removed selector override for {}", key);
        Ok(true)
    }

    fn persist(&self, entries: &BTreeMap<String, SelectorOverride>) -> Result<(), StoreError> {
        let doc: BTreeMap<&str, StoredOverride> = entries
            .iter()
            .map(|(host, o)| (host.as_str(), StoredOverride::from(o)))
            .collect();
        self.store.save(CUSTOM_SELECTORS_DOC, &serde_json::to_value(doc)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryDocumentStore;
    use serde_json::json;

    fn store() -> (Arc<MemoryDocumentStore>, SelectorOverrideStore) {
        let docs = Arc::new(MemoryDocumentStore::new());
        let overrides = SelectorOverrideStore::load(docs.clone(), 500).unwrap();
        (docs, overrides)
    }

    #[test]
    fn test_set_and_get_normalizes_hostname() {
        let (docs, overrides) = store();
        overrides
            .set(SelectorOverride::new("Chat.Example.com", " textarea ", "button.go", SubmissionMode::Click))
            .unwrap();

        let saved = overrides.get("chat.example.com").unwrap();
        assert_eq!(saved.input_selector, "textarea");
        assert!(overrides.get("CHAT.EXAMPLE.COM").is_some());

        let doc = docs.load(CUSTOM_SELECTORS_DOC).unwrap().unwrap();
        assert_eq!(doc["chat.example.com"]["input"], json!("textarea"));
        assert_eq!(doc["chat.example.com"]["button"], json!("button.go"));
        assert_eq!(doc["chat.example.com"]["submitMode"], json!("click"));
        assert!(doc["chat.example.com"]["timestamp"].as_i64().unwrap() > 0);
    }

    #[test]
    fn test_set_rejects_unsafe_records() {
        let (_, overrides) = store();
        let bad = SelectorOverride::new("chat.example.com", "textarea${x}", "button", SubmissionMode::Click);
        assert!(matches!(overrides.set(bad), Err(OverrideError::InvalidSelector(_))));

        let bad_host = SelectorOverride::new("*.example.com", "textarea", "button", SubmissionMode::Click);
        assert!(matches!(overrides.set(bad_host), Err(OverrideError::InvalidHostname(_))));
        assert!(overrides.list().is_empty());
    }

    #[test]
    fn test_load_drops_corrupt_and_unsafe_records() {
        let docs = Arc::new(MemoryDocumentStore::new());
        docs.save(
            CUSTOM_SELECTORS_DOC,
            &json!({
                "good.example.com": {"input": "textarea", "button": "button", "submitMode": "enterKey", "timestamp": 1700000000000i64},
                "evil.example.com": {"input": "textarea`);alert(1);(`", "button": "button"},
                "broken.example.com": {"input": 3}
            }),
        )
        .unwrap();

        let overrides = SelectorOverrideStore::load(docs, 500).unwrap();
        let list = overrides.list();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].hostname, "good.example.com");
        assert_eq!(list[0].submission_mode, SubmissionMode::EnterKey);
        assert_eq!(list[0].updated_at.timestamp_millis(), 1_700_000_000_000);
    }

    #[test]
    fn test_remove() {
        let (docs, overrides) = store();
        overrides
            .set(SelectorOverride::new("chat.example.com", "textarea", "button", SubmissionMode::Click))
            .unwrap();
        assert!(overrides.remove("chat.example.com").unwrap());
        assert!(!overrides.remove("chat.example.com").unwrap());
        assert_eq!(docs.load(CUSTOM_SELECTORS_DOC).unwrap(), Some(json!({})));
    }

    #[test]
    fn test_is_complete() {
        let mut record = SelectorOverride::new("a.example", "textarea", "button", SubmissionMode::Click);
        assert!(record.is_complete());
        record.submit_selector = " ".to_string();
        assert!(!record.is_complete());
    }
}
