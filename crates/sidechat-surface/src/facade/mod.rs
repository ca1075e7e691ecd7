//! Automation facade: the single entry point for pushing content into the
//! active platform's surface.

mod automation;

pub use automation::AutomationFacade;

use serde::Serialize;
use thiserror::Error;

use crate::guard::hostname_of;
use crate::overrides::SelectorOverrideStore;
use crate::registry::{PlatformEntry, SubmissionMode};
use crate::script::{ScriptError, SelectorError};
use crate::surface::ExecError;

/// Send failures. Each variant maps to a stable code for the UI.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SendError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("No platform configuration for the active surface")]
    ConfigNotFound,

    #[error("Surface is on {actual}, expected a page matching {expected}")]
    WrongUrl { expected: String, actual: String },

    #[error("Invalid selector: {0}")]
    InvalidSelector(#[from] SelectorError),

    #[error("Element picker is active on this surface")]
    PickerActive,

    #[error("Input element not found")]
    InputNotFound,

    #[error("Submit control not found or never enabled")]
    SubmitNotFound,

    #[error("Script failed: {0}")]
    ScriptFailed(String),

    #[error("Surface not ready: {0}")]
    WebviewNotReady(String),

    #[error("Timed out after {0}ms")]
    Timeout(u64),

    #[error("Payload is not an image data URL")]
    InvalidImage,

    #[error("Clipboard write failed: {0}")]
    ClipboardFailed(String),

    #[error("Paste failed: {0}")]
    PasteFailed(String),
}

impl SendError {
    pub fn code(&self) -> &'static str {
        match self {
            SendError::InvalidInput(_) => "invalid_input",
            SendError::ConfigNotFound => "config_not_found",
            SendError::WrongUrl { .. } => "wrong_url",
            SendError::InvalidSelector(_) => "invalid_selector",
            SendError::PickerActive => "picker_active",
            SendError::InputNotFound => "input_not_found",
            SendError::SubmitNotFound => "submit_not_found",
            SendError::ScriptFailed(_) => "script_failed",
            SendError::WebviewNotReady(_) => "webview_not_ready",
            SendError::Timeout(_) => "timeout",
            SendError::InvalidImage => "invalid_image",
            SendError::ClipboardFailed(_) => "clipboard_failed",
            SendError::PasteFailed(_) => "paste_failed",
        }
    }
}

impl From<ExecError> for SendError {
    fn from(e: ExecError) -> Self {
        match e {
            ExecError::NotReady(message) => SendError::WebviewNotReady(message),
            ExecError::Thrown(message) => SendError::ScriptFailed(message),
            ExecError::Timeout(ms) => SendError::Timeout(ms),
        }
    }
}

impl From<ScriptError> for SendError {
    fn from(e: ScriptError) -> Self {
        match e {
            ScriptError::Selector(e) => SendError::InvalidSelector(e),
            ScriptError::InvalidToken => SendError::ScriptFailed(e.to_string()),
        }
    }
}

/// Successful send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendReceipt {
    pub platform_id: String,
    pub mode: SubmissionMode,
    pub submitted: bool,
    /// How an image reached the input (`native`, `scripted`, `execCommand`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paste_method: Option<String>,
}

/// Wire shape of a send result: `{success, mode?, error?, message?}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SendReport {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<SubmissionMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl From<&Result<SendReceipt, SendError>> for SendReport {
    fn from(result: &Result<SendReceipt, SendError>) -> Self {
        match result {
            Ok(receipt) => SendReport {
                success: true,
                mode: Some(receipt.mode),
                error: None,
                message: None,
            },
            Err(e) => SendReport {
                success: false,
                mode: None,
                error: Some(e.code()),
                message: Some(e.to_string()),
            },
        }
    }
}

/// Platform configuration with any selector override applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub platform_id: String,
    /// Hostname the override lookup used.
    pub hostname: Option<String>,
    pub input_selector: String,
    pub submit_selector: String,
    pub submission_mode: SubmissionMode,
    pub wait_for: Option<String>,
    pub domain_match_pattern: Option<String>,
    pub image_wait_ms: u64,
    pub from_override: bool,
}

/// Merge the override for the surface's host onto `platform`.
///
/// The host comes from the surface's document URL, or the platform's start
/// URL when the surface has none yet. Override selectors replace the
/// platform's only when both are present.
pub fn resolve_config(
    platform: &PlatformEntry,
    document_url: Option<&str>,
    overrides: &SelectorOverrideStore,
) -> ResolvedConfig {
    let hostname = document_url.and_then(hostname_of).or_else(|| platform.host());
    let mut resolved = ResolvedConfig {
        platform_id: platform.id.clone(),
        hostname: hostname.clone(),
        input_selector: platform.input_selector.clone(),
        submit_selector: platform.submit_selector.clone(),
        submission_mode: platform.submission_mode,
        wait_for: None,
        domain_match_pattern: platform.domain_match_pattern.clone(),
        image_wait_ms: platform.image_wait_ms,
        from_override: false,
    };

    if let Some(record) = hostname.as_deref().and_then(|h| overrides.get(h)) {
        if record.is_complete() {
            resolved.input_selector = record.input_selector;
            resolved.submit_selector = record.submit_selector;
            resolved.submission_mode = record.submission_mode;
            resolved.wait_for = record.wait_for;
            resolved.from_override = true;
        }
    }
    resolved
}

#[cfg(test)]
#[path = "facade_tests.rs"]
mod tests;
