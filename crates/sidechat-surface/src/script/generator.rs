//! Script builders.

use serde_json::{json, Value};

use crate::registry::SubmissionMode;

use super::js;
use super::selector::validate_selector;
use super::{ScriptError, PICKER_REPORT_PREFIX};

/// Polling bound for a wait loop inside a script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollTiming {
    pub wait_ms: u64,
    pub interval_ms: u64,
}

impl PollTiming {
    pub const fn new(wait_ms: u64, interval_ms: u64) -> Self {
        Self { wait_ms, interval_ms }
    }
}

/// What to do once the awaited element appears.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementAction<'a> {
    Focus,
    Write(&'a str),
}

/// Parameters for a combined insert-and-submit script.
#[derive(Debug, Clone)]
pub struct TextSendPlan<'a> {
    pub input_selector: &'a str,
    pub submit_selector: &'a str,
    /// Optional element that must exist before the input is used.
    pub ready_selector: Option<&'a str>,
    pub mode: SubmissionMode,
    pub text: &'a str,
    pub auto_submit: bool,
    pub input_timing: PollTiming,
    pub submit_timing: PollTiming,
}

/// Builds self-contained automation scripts.
#[derive(Debug, Clone)]
pub struct ScriptGenerator {
    max_selector_len: usize,
}

impl ScriptGenerator {
    pub fn new(max_selector_len: usize) -> Self {
        Self { max_selector_len }
    }

    pub fn max_selector_len(&self) -> usize {
        self.max_selector_len
    }

    fn selector<'s>(&self, selector: &'s str) -> Result<&'s str, ScriptError> {
        Ok(validate_selector(selector, self.max_selector_len)?)
    }

    /// Poll for `selector`, then focus it or write text into it.
    pub fn wait_for_element(
        &self,
        selector: &str,
        action: ElementAction<'_>,
        timing: PollTiming,
    ) -> Result<String, ScriptError> {
        let selector = self.selector(selector)?;
        let text = match action {
            ElementAction::Focus => Value::Null,
            ElementAction::Write(text) => Value::from(text),
        };
        let args = json!({
            "selector": selector,
            "text": text,
            "waitMs": timing.wait_ms,
            "intervalMs": timing.interval_ms,
        });
        Ok(assemble(&args, js::WAIT_FOR_ELEMENT))
    }

    /// Poll for an enabled button matching `selector` and click it.
    pub fn wait_for_enabled_button_and_click(
        &self,
        selector: &str,
        timing: PollTiming,
    ) -> Result<String, ScriptError> {
        let selector = self.selector(selector)?;
        let args = json!({
            "selector": selector,
            "waitMs": timing.wait_ms,
            "intervalMs": timing.interval_ms,
        });
        Ok(assemble(&args, js::CLICK_ENABLED_BUTTON))
    }

    /// Poll for `selector` and simulate the Enter key on it.
    pub fn press_enter(&self, selector: &str, timing: PollTiming) -> Result<String, ScriptError> {
        let selector = self.selector(selector)?;
        let args = json!({
            "selector": selector,
            "waitMs": timing.wait_ms,
            "intervalMs": timing.interval_ms,
        });
        Ok(assemble(&args, js::PRESS_ENTER))
    }

    /// Focus the input and paste into it.
    ///
    /// The payload must already be on the system clipboard; the script only
    /// reads it from there. It tries `execCommand('paste')` first, then
    /// re-dispatches the clipboard's image items as a paste event.
    pub fn paste_trigger(&self, input_selector: &str, timing: PollTiming) -> Result<String, ScriptError> {
        let selector = self.selector(input_selector)?;
        let args = json!({
            "selector": selector,
            "waitMs": timing.wait_ms,
            "intervalMs": timing.interval_ms,
        });
        Ok(assemble(&args, js::PASTE_TRIGGER))
    }

    /// Insert text and, when requested, submit it in the platform's mode.
    pub fn send_text(&self, plan: &TextSendPlan<'_>) -> Result<String, ScriptError> {
        let input = self.selector(plan.input_selector)?;
        let submit = self.selector(plan.submit_selector)?;
        let ready = plan.ready_selector.map(|s| self.selector(s)).transpose()?;
        let args = json!({
            "selector": input,
            "submitSelector": submit,
            "readySelector": ready,
            "text": plan.text,
            "autoSubmit": plan.auto_submit,
            "mode": plan.mode,
            "waitMs": plan.input_timing.wait_ms,
            "intervalMs": plan.input_timing.interval_ms,
            "submitWaitMs": plan.submit_timing.wait_ms,
            "submitIntervalMs": plan.submit_timing.interval_ms,
        });
        Ok(assemble(&args, js::SEND_TEXT))
    }

    /// Install element-picker instrumentation tagged with `token`.
    pub fn picker_install(&self, token: &str) -> Result<String, ScriptError> {
        if token.is_empty() || !token.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(ScriptError::InvalidToken);
        }
        let args = json!({
            "token": token,
            "prefix": PICKER_REPORT_PREFIX,
            "promptInput": "Sidechat: click the message input box",
            "promptSubmit": "Sidechat: now click the send button (Esc to cancel)",
        });
        Ok(assemble(&args, js::PICKER_INSTALL))
    }

    /// Remove element-picker instrumentation.
    pub fn picker_remove(&self) -> String {
        assemble(&json!({}), js::PICKER_REMOVE)
    }
}

impl Default for ScriptGenerator {
    fn default() -> Self {
        Self::new(super::DEFAULT_MAX_SELECTOR_LEN)
    }
}

fn assemble(args: &Value, body: &str) -> String {
    format!(
        "(async () => {{\n  const ARGS = {};\n{}{}}})()",
        args,
        js::PRELUDE,
        body
    )
}
