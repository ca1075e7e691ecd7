//! Automation timing configuration.

use serde::{Deserialize, Serialize};

use super::default_true;

/// Timings and limits for generated automation scripts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationConfig {
    /// Submit automatically after inserting content.
    #[serde(default = "default_true")]
    pub auto_submit: bool,

    #[serde(default = "default_input_wait_ms")]
    pub input_wait_ms: u64,

    #[serde(default = "default_input_poll_ms")]
    pub input_poll_ms: u64,

    #[serde(default = "default_submit_wait_text_ms")]
    pub submit_wait_text_ms: u64,

    #[serde(default = "default_submit_wait_image_ms")]
    pub submit_wait_image_ms: u64,

    #[serde(default = "default_submit_poll_ms")]
    pub submit_poll_ms: u64,

    /// Delay between the clipboard write and the paste attempt.
    #[serde(default = "default_clipboard_settle_ms")]
    pub clipboard_settle_ms: u64,

    /// Added on top of a script's own polling bound when executing it.
    #[serde(default = "default_script_timeout_margin_ms")]
    pub script_timeout_margin_ms: u64,

    #[serde(default = "default_max_selector_len")]
    pub max_selector_len: usize,
}

fn default_input_wait_ms() -> u64 {
    5000
}

fn default_input_poll_ms() -> u64 {
    100
}

fn default_submit_wait_text_ms() -> u64 {
    8000
}

fn default_submit_wait_image_ms() -> u64 {
    10000
}

fn default_submit_poll_ms() -> u64 {
    200
}

fn default_clipboard_settle_ms() -> u64 {
    300
}

fn default_script_timeout_margin_ms() -> u64 {
    2000
}

fn default_max_selector_len() -> usize {
    500
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            auto_submit: default_true(),
            input_wait_ms: default_input_wait_ms(),
            input_poll_ms: default_input_poll_ms(),
            submit_wait_text_ms: default_submit_wait_text_ms(),
            submit_wait_image_ms: default_submit_wait_image_ms(),
            submit_poll_ms: default_submit_poll_ms(),
            clipboard_settle_ms: default_clipboard_settle_ms(),
            script_timeout_margin_ms: default_script_timeout_margin_ms(),
            max_selector_len: default_max_selector_len(),
        }
    }
}
