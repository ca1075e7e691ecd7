//! Platform registry: built-in AI platforms plus user-added custom entries.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::guard::HostPattern;
use crate::script::{validate_selector, SelectorError, DEFAULT_MAX_SELECTOR_LEN};
use crate::store::{DocumentStore, StoreError, CUSTOM_PLATFORMS_DOC};

/// How committing content is triggered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SubmissionMode {
    #[default]
    Click,
    EnterKey,
}

impl SubmissionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionMode::Click => "click",
            SubmissionMode::EnterKey => "enterKey",
        }
    }
}

/// A configured AI platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformEntry {
    pub id: String,
    pub url: String,
    pub display_name: String,
    pub icon: String,
    pub input_selector: String,
    pub submit_selector: String,
    /// Host pattern the surface's document must match before content is sent.
    pub domain_match_pattern: Option<String>,
    pub submission_mode: SubmissionMode,
    /// Extra time an uploaded image needs before the send button is usable.
    pub image_wait_ms: u64,
    #[serde(default)]
    pub is_custom: bool,
}

impl PlatformEntry {
    #[allow(clippy::too_many_arguments)]
    fn builtin(
        id: &str,
        display_name: &str,
        url: &str,
        input_selector: &str,
        submit_selector: &str,
        pattern: &str,
        submission_mode: SubmissionMode,
        image_wait_ms: u64,
    ) -> Self {
        Self {
            id: id.to_string(),
            url: url.to_string(),
            display_name: display_name.to_string(),
            icon: format!("{}.svg", id),
            input_selector: input_selector.to_string(),
            submit_selector: submit_selector.to_string(),
            domain_match_pattern: Some(pattern.to_string()),
            submission_mode,
            image_wait_ms,
            is_custom: false,
        }
    }

    /// Lowercased host of the platform's start URL.
    pub fn host(&self) -> Option<String> {
        url::Url::parse(&self.url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()))
    }
}

/// Built-in platforms in display order.
pub fn builtin_platforms() -> Vec<PlatformEntry> {
    use SubmissionMode::{Click, EnterKey};
    vec![
        PlatformEntry::builtin(
            "chatgpt",
            "ChatGPT",
            "https://chatgpt.com/",
            "#prompt-textarea",
            r#"button[data-testid="send-button"]"#,
            "chatgpt.com",
            Click,
            2000,
        ),
        PlatformEntry::builtin(
            "gemini",
            "Gemini",
            "https://gemini.google.com/app",
            "rich-textarea .ql-editor",
            "button.send-button",
            "gemini.google.com",
            Click,
            3000,
        ),
        PlatformEntry::builtin(
            "claude",
            "Claude",
            "https://claude.ai/new",
            r#"div.ProseMirror[contenteditable="true"]"#,
            r#"button[aria-label="Send message"]"#,
            "claude.ai",
            Click,
            2500,
        ),
        PlatformEntry::builtin(
            "deepseek",
            "DeepSeek",
            "https://chat.deepseek.com/",
            "textarea#chat-input",
            r#"div[role="button"][aria-disabled="false"]"#,
            "chat.deepseek.com",
            EnterKey,
            3000,
        ),
        PlatformEntry::builtin(
            "perplexity",
            "Perplexity",
            "https://www.perplexity.ai/",
            "textarea[placeholder]",
            r#"button[aria-label="Submit"]"#,
            "*.perplexity.ai",
            Click,
            2000,
        ),
        PlatformEntry::builtin(
            "copilot",
            "Copilot",
            "https://copilot.microsoft.com/",
            "textarea#userInput",
            r#"button[aria-label="Submit message"]"#,
            "copilot.microsoft.com",
            Click,
            2500,
        ),
        PlatformEntry::builtin(
            "grok",
            "Grok",
            "https://grok.com/",
            r#"textarea[aria-label="Ask Grok anything"]"#,
            r#"button[type="submit"]"#,
            "grok.com",
            EnterKey,
            2000,
        ),
    ]
}

/// Which identity the login prompt for a platform talks about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginProvider {
    OpenAi,
    Google,
    Anthropic,
    DeepSeek,
    Perplexity,
    Microsoft,
    Xai,
    Generic,
}

/// Presentation descriptor for a platform's login prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginPresentation {
    pub title: String,
    pub icon: String,
    pub hint: String,
}

impl LoginProvider {
    pub fn for_platform(platform_id: &str) -> Self {
        match platform_id {
            "chatgpt" => LoginProvider::OpenAi,
            "gemini" => LoginProvider::Google,
            "claude" => LoginProvider::Anthropic,
            "deepseek" => LoginProvider::DeepSeek,
            "perplexity" => LoginProvider::Perplexity,
            "copilot" => LoginProvider::Microsoft,
            "grok" => LoginProvider::Xai,
            _ => LoginProvider::Generic,
        }
    }

    fn account(&self) -> &'static str {
        match self {
            LoginProvider::OpenAi => "OpenAI account",
            LoginProvider::Google => "Google account",
            LoginProvider::Anthropic => "Anthropic account",
            LoginProvider::DeepSeek => "DeepSeek account",
            LoginProvider::Perplexity => "Perplexity account",
            LoginProvider::Microsoft => "Microsoft account",
            LoginProvider::Xai => "X account",
            LoginProvider::Generic => "account",
        }
    }
}

/// Registry errors.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Platform not found: {0}")]
    NotFound(String),

    #[error("Built-in platform cannot be removed: {0}")]
    BuiltIn(String),

    #[error("Invalid platform URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid domain pattern: {0}")]
    InvalidPattern(String),

    #[error("Invalid selector: {0}")]
    InvalidSelector(#[from] SelectorError),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

impl RegistryError {
    pub fn code(&self) -> &'static str {
        match self {
            RegistryError::NotFound(_) => "platform_not_found",
            RegistryError::BuiltIn(_) => "built_in_platform",
            RegistryError::InvalidUrl(_) => "invalid_url",
            RegistryError::InvalidPattern(_) => "invalid_pattern",
            RegistryError::InvalidSelector(e) => e.code(),
            RegistryError::Storage(_) => "storage_failed",
        }
    }
}

/// A user-supplied platform definition.
#[derive(Debug, Clone)]
pub struct CustomPlatform {
    pub name: String,
    pub url: String,
    pub icon: Option<String>,
    pub input_selector: String,
    pub submit_selector: String,
    pub submission_mode: SubmissionMode,
    pub domain_match_pattern: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredSelectors {
    input: String,
    button: String,
    #[serde(default)]
    submit_mode: SubmissionMode,
    #[serde(default)]
    domain_pattern: Option<String>,
    #[serde(default = "default_image_wait_ms")]
    image_wait_ms: u64,
}

fn default_image_wait_ms() -> u64 {
    2000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredPlatform {
    id: String,
    name: String,
    url: String,
    #[serde(default)]
    icon: String,
    selectors: StoredSelectors,
    #[serde(default = "stored_is_custom")]
    is_custom: bool,
}

fn stored_is_custom() -> bool {
    true
}

impl From<StoredPlatform> for PlatformEntry {
    fn from(stored: StoredPlatform) -> Self {
        Self {
            id: stored.id,
            url: stored.url,
            display_name: stored.name,
            icon: stored.icon,
            input_selector: stored.selectors.input,
            submit_selector: stored.selectors.button,
            domain_match_pattern: stored.selectors.domain_pattern,
            submission_mode: stored.selectors.submit_mode,
            image_wait_ms: stored.selectors.image_wait_ms,
            is_custom: true,
        }
    }
}

impl From<&PlatformEntry> for StoredPlatform {
    fn from(entry: &PlatformEntry) -> Self {
        Self {
            id: entry.id.clone(),
            name: entry.display_name.clone(),
            url: entry.url.clone(),
            icon: entry.icon.clone(),
            selectors: StoredSelectors {
                input: entry.input_selector.clone(),
                button: entry.submit_selector.clone(),
                submit_mode: entry.submission_mode,
                domain_pattern: entry.domain_match_pattern.clone(),
                image_wait_ms: entry.image_wait_ms,
            },
            is_custom: true,
        }
    }
}

/// Ordered platform registry.
pub struct PlatformRegistry {
    entries: RwLock<Vec<PlatformEntry>>,
    store: Arc<dyn DocumentStore>,
}

impl PlatformRegistry {
    /// Built-in platforms plus any persisted custom entries.
    pub fn load(store: Arc<dyn DocumentStore>) -> Result<Self, RegistryError> {
        let mut entries = builtin_platforms();

        if let Some(doc) = store.load(CUSTOM_PLATFORMS_DOC)? {
            let records: BTreeMap<String, serde_json::Value> =
                serde_json::from_value(doc).map_err(StoreError::from)?;
            for (id, record) in records {
                match serde_json::from_value::<StoredPlatform>(record) {
                    Ok(stored) if entries.iter().all(|e| e.id != stored.id) => {
                        entries.push(stored.into())
                    }
                    Ok(_) => warn!("Ignoring custom platform {} that shadows an existing id", id),
                    Err(e) => warn!("Skipping corrupt custom platform {}: {}", id, e),
                }
            }
        }

        Ok(Self {
            entries: RwLock::new(entries),
            store,
        })
    }

    pub fn get(&self, id: &str) -> Option<PlatformEntry> {
        self.entries.read().iter().find(|e| e.id == id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.read().iter().any(|e| e.id == id)
    }

    pub fn list(&self) -> Vec<PlatformEntry> {
        self.entries.read().clone()
    }

    /// Host patterns covering every configured platform.
    pub fn domain_patterns(&self) -> Vec<String> {
        let entries = self.entries.read();
        let mut patterns = Vec::new();
        for entry in entries.iter() {
            if let Some(host) = entry.host() {
                patterns.push(host);
            }
            if let Some(pattern) = &entry.domain_match_pattern {
                patterns.push(pattern.to_ascii_lowercase());
            }
        }
        patterns.sort();
        patterns.dedup();
        patterns
    }

    /// Add and persist a custom platform.
    pub fn add_custom(&self, custom: CustomPlatform) -> Result<PlatformEntry, RegistryError> {
        let parsed = url::Url::parse(&custom.url)
            .map_err(|e| RegistryError::InvalidUrl(format!("{}: {}", custom.url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
            return Err(RegistryError::InvalidUrl(custom.url));
        }
        if let Some(pattern) = &custom.domain_match_pattern {
            if HostPattern::parse(pattern).is_none() {
                return Err(RegistryError::InvalidPattern(pattern.clone()));
            }
        }
        validate_selector(&custom.input_selector, DEFAULT_MAX_SELECTOR_LEN)?;
        validate_selector(&custom.submit_selector, DEFAULT_MAX_SELECTOR_LEN)?;

        let id = format!("custom-{}", &uuid::Uuid::new_v4().simple().to_string()[..8]);
        let entry = PlatformEntry {
            id: id.clone(),
            url: parsed.to_string(),
            display_name: custom.name,
            icon: custom.icon.unwrap_or_else(|| "custom.svg".to_string()),
            input_selector: custom.input_selector.trim().to_string(),
            submit_selector: custom.submit_selector.trim().to_string(),
            domain_match_pattern: custom.domain_match_pattern,
            submission_mode: custom.submission_mode,
            image_wait_ms: default_image_wait_ms(),
            is_custom: true,
        };

        let mut entries = self.entries.write();
        let mut next = entries.clone();
        next.push(entry.clone());
        self.persist(&next)?;
        *entries = next;

        info!("Added custom platform {} ({})", entry.display_name, id);
        Ok(entry)
    }

    /// Remove and persist a custom platform.
    pub fn remove_custom(&self, id: &str) -> Result<PlatformEntry, RegistryError> {
        let mut entries = self.entries.write();
        let index = entries
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
        if !entries[index].is_custom {
            return Err(RegistryError::BuiltIn(id.to_string()));
        }
        let mut next = entries.clone();
        let removed = next.remove(index);
        self.persist(&next)?;
        *entries = next;

        info!("Removed custom platform {}", id);
        Ok(removed)
    }

    /// Presentation for a platform's login prompt.
    pub fn login_presentation(&self, id: &str) -> Option<LoginPresentation> {
        let entry = self.get(id)?;
        let provider = LoginProvider::for_platform(&entry.id);
        Some(LoginPresentation {
            title: format!("Sign in to {}", entry.display_name),
            icon: entry.icon.clone(),
            hint: format!(
                "Log in with your {} in this panel, or import cookies into a profile.",
                provider.account()
            ),
        })
    }

    fn persist(&self, entries: &[PlatformEntry]) -> Result<(), StoreError> {
        let doc: BTreeMap<String, StoredPlatform> = entries
            .iter()
            .filter(|e| e.is_custom)
            .map(|e| (e.id.clone(), StoredPlatform::from(e)))
            .collect();
        self.store.save(CUSTOM_PLATFORMS_DOC, &serde_json::to_value(doc)?)
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
