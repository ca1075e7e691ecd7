//! Send flows for text and images.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde_json::Value;
use sidechat_config::AutomationConfig;
use tracing::{debug, info, warn};

use crate::guard::url_matches_pattern;
use crate::host::HostBridge;
use crate::overrides::SelectorOverrideStore;
use crate::picker::ElementPicker;
use crate::registry::{PlatformEntry, PlatformRegistry, SubmissionMode};
use crate::script::{
    is_image_data_url, ElementAction, PollTiming, ScriptGenerator, ScriptReport, TextSendPlan,
};
use crate::surface::SurfaceController;

use super::{resolve_config, ResolvedConfig, SendError, SendReceipt};

/// Which step of a send a script failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Insert,
    Paste,
    Submit,
}

/// Entry point for "send text" and "send image".
///
/// Callers must not overlap sends against the same platform; both flows
/// drive the same input element.
pub struct AutomationFacade {
    registry: Arc<PlatformRegistry>,
    overrides: Arc<SelectorOverrideStore>,
    controller: Arc<SurfaceController>,
    picker: Arc<ElementPicker>,
    host: Arc<dyn HostBridge>,
    generator: ScriptGenerator,
    config: RwLock<AutomationConfig>,
}

impl AutomationFacade {
    pub fn new(
        registry: Arc<PlatformRegistry>,
        overrides: Arc<SelectorOverrideStore>,
        controller: Arc<SurfaceController>,
        picker: Arc<ElementPicker>,
        host: Arc<dyn HostBridge>,
        config: AutomationConfig,
    ) -> Self {
        Self {
            registry,
            overrides,
            controller,
            picker,
            host,
            generator: ScriptGenerator::new(config.max_selector_len),
            config: RwLock::new(config),
        }
    }

    pub fn auto_submit(&self) -> bool {
        self.config.read().auto_submit
    }

    pub fn set_auto_submit(&self, enabled: bool) {
        self.config.write().auto_submit = enabled;
        info!("Auto-submit {}", if enabled { "enabled" } else { "disabled" });
    }

    /// Resolved configuration for the active platform's current page.
    pub async fn resolve_active(&self) -> Result<ResolvedConfig, SendError> {
        let (platform, document_url) = self.active_platform().await?;
        Ok(resolve_config(&platform, document_url.as_deref(), &self.overrides))
    }

    /// Insert `text` into the active platform's input and optionally submit it.
    pub async fn send_text(&self, text: &str) -> Result<SendReceipt, SendError> {
        if text.trim().is_empty() {
            return Err(SendError::InvalidInput("text is empty".to_string()));
        }
        let resolved = self.prepare().await?;
        let config = self.config.read().clone();

        let plan = TextSendPlan {
            input_selector: &resolved.input_selector,
            submit_selector: &resolved.submit_selector,
            ready_selector: resolved.wait_for.as_deref(),
            mode: resolved.submission_mode,
            text,
            auto_submit: config.auto_submit,
            input_timing: PollTiming::new(config.input_wait_ms, config.input_poll_ms),
            submit_timing: PollTiming::new(config.submit_wait_text_ms, config.submit_poll_ms),
        };
        let script = self.generator.send_text(&plan)?;

        let mut budget = config.input_wait_ms + config.script_timeout_margin_ms;
        if config.auto_submit {
            budget += config.submit_wait_text_ms;
        }
        if resolved.wait_for.is_some() {
            budget += config.input_wait_ms;
        }

        debug!(
            "Sending {} chars to {} (override: {})",
            text.chars().count(),
            resolved.platform_id,
            resolved.from_override
        );
        let report = self.run(&resolved.platform_id, &script, budget, Phase::Insert).await?;
        let submitted = report.submitted.unwrap_or(config.auto_submit);
        info!("Sent text to {} (submitted: {})", resolved.platform_id, submitted);

        Ok(SendReceipt {
            platform_id: resolved.platform_id,
            mode: resolved.submission_mode,
            submitted,
            paste_method: None,
        })
    }

    /// Paste an image (a base64 `data:image/...` URL) into the active
    /// platform's input via the system clipboard.
    pub async fn send_image(&self, image_data_url: &str) -> Result<SendReceipt, SendError> {
        if image_data_url.trim().is_empty() {
            return Err(SendError::InvalidInput("image payload is empty".to_string()));
        }
        if !is_image_data_url(image_data_url) {
            return Err(SendError::InvalidImage);
        }
        let resolved = self.prepare().await?;
        let config = self.config.read().clone();
        let platform_id = resolved.platform_id.clone();
        let input_timing = PollTiming::new(config.input_wait_ms, config.input_poll_ms);
        let input_budget = config.input_wait_ms + config.script_timeout_margin_ms;

        self.host
            .write_clipboard_image(image_data_url)
            .await
            .map_err(|e| SendError::ClipboardFailed(e.to_string()))?;

        let focus = self
            .generator
            .wait_for_element(&resolved.input_selector, ElementAction::Focus, input_timing)?;
        self.run(&platform_id, &focus, input_budget, Phase::Insert).await?;

        tokio::time::sleep(Duration::from_millis(config.clipboard_settle_ms)).await;
        if !self.host.clipboard_has_image().await {
            return Err(SendError::ClipboardFailed(
                "clipboard does not hold the image".to_string(),
            ));
        }

        // Native paste goes to the focused surface.
        if let Err(e) = self.controller.focus(&platform_id).await {
            warn!("Failed to focus surface {} before paste: {}", platform_id, e);
        }
        let paste_method = match self.controller.native_paste(&platform_id).await {
            Ok(()) => "native".to_string(),
            Err(e) => {
                debug!("Native paste unavailable on {} ({}), using scripted paste", platform_id, e);
                let script = self
                    .generator
                    .paste_trigger(&resolved.input_selector, input_timing)?;
                let report = self.run(&platform_id, &script, input_budget, Phase::Paste).await?;
                report.method.unwrap_or_else(|| "scripted".to_string())
            }
        };

        let submitted = if config.auto_submit {
            tokio::time::sleep(Duration::from_millis(resolved.image_wait_ms)).await;
            let timing = PollTiming::new(config.submit_wait_image_ms, config.submit_poll_ms);
            let script = match resolved.submission_mode {
                SubmissionMode::Click => self
                    .generator
                    .wait_for_enabled_button_and_click(&resolved.submit_selector, timing)?,
                SubmissionMode::EnterKey => {
                    self.generator.press_enter(&resolved.input_selector, timing)?
                }
            };
            let budget = config.submit_wait_image_ms + config.script_timeout_margin_ms;
            self.run(&platform_id, &script, budget, Phase::Submit).await?;
            true
        } else {
            false
        };

        info!(
            "Sent image to {} via {} paste (submitted: {})",
            platform_id, paste_method, submitted
        );
        Ok(SendReceipt {
            platform_id,
            mode: resolved.submission_mode,
            submitted,
            paste_method: Some(paste_method),
        })
    }

    async fn active_platform(&self) -> Result<(PlatformEntry, Option<String>), SendError> {
        let platform_id = self
            .controller
            .active_platform()
            .ok_or(SendError::ConfigNotFound)?;
        let platform = self
            .registry
            .get(&platform_id)
            .ok_or(SendError::ConfigNotFound)?;
        let document_url = self.controller.document_url(&platform_id).await;
        Ok((platform, document_url))
    }

    /// Shared preconditions: a configured active platform, no picker session
    /// on it, and a surface still on the expected site.
    async fn prepare(&self) -> Result<ResolvedConfig, SendError> {
        let (platform, document_url) = self.active_platform().await?;
        if self.picker.is_active_on(&platform.id) {
            return Err(SendError::PickerActive);
        }
        let resolved = resolve_config(&platform, document_url.as_deref(), &self.overrides);

        if let (Some(pattern), Some(url)) = (&resolved.domain_match_pattern, &document_url) {
            if !url_matches_pattern(url, pattern) {
                warn!("Refusing to send to {}: {} does not match {}", platform.id, url, pattern);
                return Err(SendError::WrongUrl {
                    expected: pattern.clone(),
                    actual: url.clone(),
                });
            }
        }
        Ok(resolved)
    }

    async fn run(
        &self,
        platform_id: &str,
        script: &str,
        timeout_ms: u64,
        phase: Phase,
    ) -> Result<ScriptReport, SendError> {
        let value = self
            .controller
            .execute_script(platform_id, script, timeout_ms)
            .await?;
        let report = decode(&value)?;
        if report.success {
            return Ok(report);
        }
        debug!("{:?} script on {} failed: {}", phase, platform_id, report.reason());
        Err(failure(&report, phase))
    }
}

fn decode(value: &Value) -> Result<ScriptReport, SendError> {
    ScriptReport::from_value(value)
        .ok_or_else(|| SendError::ScriptFailed(format!("unexpected script result: {}", value)))
}

fn failure(report: &ScriptReport, phase: Phase) -> SendError {
    let message = report.message.clone().unwrap_or_else(|| report.reason().to_string());
    match (report.reason(), phase) {
        (_, Phase::Paste) | ("paste_unsupported", _) => SendError::PasteFailed(message),
        ("input_not_found", Phase::Submit) | ("timeout", Phase::Submit) | ("submit_not_found", _) => {
            SendError::SubmitNotFound
        }
        ("input_not_found", _) => SendError::InputNotFound,
        ("timeout", _) => SendError::InputNotFound,
        _ => SendError::ScriptFailed(message),
    }
}
