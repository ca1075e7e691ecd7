//! Automation script generation.
//!
//! Every script produced here is a self-contained async IIFE that resolves to
//! a small JSON report (`{success, reason?, ...}`). Parameters are passed as a
//! single JSON object literal, so no caller-provided string is ever spliced
//! into code; selectors are additionally checked against a character
//! allowlist before a script is built.

mod generator;
mod js;
mod selector;

pub use generator::{ElementAction, PollTiming, ScriptGenerator, TextSendPlan};
pub use selector::{validate_selector, SelectorError, DEFAULT_MAX_SELECTOR_LEN};

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Console prefix used by the element picker to report selections.
pub const PICKER_REPORT_PREFIX: &str = "__sidechat_picker__:";

static IMAGE_DATA_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^data:image/(png|jpeg|jpg|gif|webp|bmp);base64,[A-Za-z0-9+/]+={0,2}$")
        .expect("image data URL pattern is valid")
});

/// Script construction errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScriptError {
    #[error("Invalid selector: {0}")]
    Selector(#[from] SelectorError),

    #[error("Invalid picker token")]
    InvalidToken,
}

impl ScriptError {
    pub fn code(&self) -> &'static str {
        match self {
            ScriptError::Selector(e) => e.code(),
            ScriptError::InvalidToken => "invalid_token",
        }
    }
}

/// Whether `value` is a `data:image/<type>;base64,...` URL.
pub fn is_image_data_url(value: &str) -> bool {
    IMAGE_DATA_URL.is_match(value)
}

/// Decoded result of a generated script.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptReport {
    #[serde(default)]
    pub success: bool,
    pub reason: Option<String>,
    pub message: Option<String>,
    pub waited_ms: Option<u64>,
    pub method: Option<String>,
    pub submitted: Option<bool>,
}

impl ScriptReport {
    /// Decode a script's return value; `None` when it is not a report object.
    pub fn from_value(value: &Value) -> Option<Self> {
        if !value.is_object() {
            return None;
        }
        serde_json::from_value(value.clone()).ok()
    }

    pub fn reason(&self) -> &str {
        self.reason.as_deref().unwrap_or("unknown")
    }
}

#[cfg(test)]
#[path = "script_tests.rs"]
mod tests;
