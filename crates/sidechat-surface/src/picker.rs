//! Element picker: lets the user teach selectors for a site by clicking
//! its real input and send controls.
//!
//! Instrumentation reports out of band through console messages. Each
//! session carries a fresh token so a late report from an earlier session
//! is never taken for the current one.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::guard::hostname_of;
use crate::overrides::{OverrideError, SelectorOverride, SelectorOverrideStore};
use crate::registry::{PlatformRegistry, SubmissionMode};
use crate::script::{ScriptError, ScriptGenerator, ScriptReport};
use crate::surface::{ExecError, SurfaceController, SurfaceNotice};

const OUTCOME_CAPACITY: usize = 16;

/// Picker errors.
#[derive(Debug, Error)]
pub enum PickerError {
    #[error("Unknown platform: {0}")]
    UnknownPlatform(String),

    #[error("Surface has no page with a hostname yet")]
    NoHostname,

    #[error("Script error: {0}")]
    Script(#[from] ScriptError),

    #[error("Script execution failed: {0}")]
    Exec(#[from] ExecError),

    #[error("Instrumentation failed: {0}")]
    Install(String),
}

impl PickerError {
    pub fn code(&self) -> &'static str {
        match self {
            PickerError::UnknownPlatform(_) => "unknown_platform",
            PickerError::NoHostname => "no_hostname",
            PickerError::Script(e) => e.code(),
            PickerError::Exec(e) => e.code(),
            PickerError::Install(_) => "picker_install_failed",
        }
    }
}

/// An in-progress picking session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickerSession {
    pub token: String,
    pub platform_id: String,
    pub hostname: String,
    pub started_at: DateTime<Utc>,
}

/// Result of handling one picker report.
#[derive(Debug, Clone, PartialEq)]
pub enum PickerOutcome {
    /// Both selectors captured and persisted.
    Saved(SelectorOverride),
    /// Partial selection; nothing saved.
    Incomplete(String),
    /// User dismissed the picker.
    Cancelled,
    /// Report from a session that is no longer current.
    Stale,
}

#[derive(Debug, Deserialize)]
struct PickerPayload {
    token: Option<String>,
    input: Option<String>,
    submit: Option<String>,
    #[serde(default)]
    cancelled: bool,
}

pub struct ElementPicker {
    controller: Arc<SurfaceController>,
    overrides: Arc<SelectorOverrideStore>,
    registry: Arc<PlatformRegistry>,
    generator: ScriptGenerator,
    script_timeout_ms: u64,
    session: RwLock<Option<PickerSession>>,
    outcomes: broadcast::Sender<PickerOutcome>,
}

impl ElementPicker {
    pub fn new(
        controller: Arc<SurfaceController>,
        overrides: Arc<SelectorOverrideStore>,
        registry: Arc<PlatformRegistry>,
        generator: ScriptGenerator,
        script_timeout_ms: u64,
    ) -> Self {
        let (outcomes, _) = broadcast::channel(OUTCOME_CAPACITY);
        Self {
            controller,
            overrides,
            registry,
            generator,
            script_timeout_ms,
            session: RwLock::new(None),
            outcomes,
        }
    }

    pub fn session(&self) -> Option<PickerSession> {
        self.session.read().clone()
    }

    pub fn is_active_on(&self, platform_id: &str) -> bool {
        self.session
            .read()
            .as_ref()
            .is_some_and(|s| s.platform_id == platform_id)
    }

    /// Outcomes of reports handled by [`ElementPicker::spawn_listener`].
    pub fn subscribe(&self) -> broadcast::Receiver<PickerOutcome> {
        self.outcomes.subscribe()
    }

    /// Inject the picker into a platform's surface. Replaces any running session.
    pub async fn start(&self, platform_id: &str) -> Result<PickerSession, PickerError> {
        if !self.registry.contains(platform_id) {
            return Err(PickerError::UnknownPlatform(platform_id.to_string()));
        }
        let url = self
            .controller
            .document_url(platform_id)
            .await
            .ok_or_else(|| ExecError::NotReady(format!("no page loaded for {}", platform_id)))?;
        let hostname = hostname_of(&url).ok_or(PickerError::NoHostname)?;

        if self.session().is_some() {
            self.cancel().await?;
        }

        let token = uuid::Uuid::new_v4().to_string();
        let script = self.generator.picker_install(&token)?;
        let value = self
            .controller
            .execute_script(platform_id, &script, self.script_timeout_ms)
            .await?;
        let report = ScriptReport::from_value(&value).unwrap_or_default();
        if !report.success {
            return Err(PickerError::Install(report.reason().to_string()));
        }

        let session = PickerSession {
            token,
            platform_id: platform_id.to_string(),
            hostname,
            started_at: Utc::now(),
        };
        info!("Element picker started on {} ({})", session.platform_id, session.hostname);
        *self.session.write() = Some(session.clone());
        Ok(session)
    }

    /// End the current session and strip its instrumentation.
    ///
    /// The session is forgotten even if the removal script fails. Returns
    /// whether a session was running.
    pub async fn cancel(&self) -> Result<bool, PickerError> {
        let Some(session) = self.session.write().take() else {
            return Ok(false);
        };
        info!("Element picker cancelled on {}", session.platform_id);
        let script = self.generator.picker_remove();
        self.controller
            .execute_script(&session.platform_id, &script, self.script_timeout_ms)
            .await?;
        Ok(true)
    }

    /// Correlate and apply one report payload from `platform_id`.
    pub fn handle_report(&self, platform_id: &str, payload: &str) -> PickerOutcome {
        let parsed = serde_json::from_str::<PickerPayload>(payload);
        let mut slot = self.session.write();
        let current = slot
            .as_ref()
            .filter(|s| s.platform_id == platform_id)
            .cloned();
        let Some(session) = current else {
            debug!("Picker report from {} with no session running", platform_id);
            return PickerOutcome::Stale;
        };

        let payload = match parsed {
            Ok(payload) => payload,
            Err(e) => {
                // Page scripts can write to the console too; only a report
                // carrying the session token may end the session.
                warn!("Ignoring malformed picker report from {}: {}", platform_id, e);
                return PickerOutcome::Stale;
            }
        };
        if payload.token.as_deref() != Some(session.token.as_str()) {
            warn!("Discarding picker report with a stale token on {}", platform_id);
            return PickerOutcome::Stale;
        }
        *slot = None;
        drop(slot);

        if payload.cancelled {
            info!("Element picker dismissed on {}", platform_id);
            return PickerOutcome::Cancelled;
        }

        let (Some(input), Some(submit)) = (
            payload.input.filter(|s| !s.trim().is_empty()),
            payload.submit.filter(|s| !s.trim().is_empty()),
        ) else {
            warn!("Incomplete picker selection on {}", platform_id);
            return PickerOutcome::Incomplete("both the input and the send control are required".to_string());
        };

        let mode = self
            .registry
            .get(platform_id)
            .map(|p| p.submission_mode)
            .unwrap_or(SubmissionMode::Click);
        let record = SelectorOverride::new(&session.hostname, input, submit, mode);
        match self.overrides.set(record.clone()) {
            Ok(()) => PickerOutcome::Saved(record),
            Err(OverrideError::InvalidSelector(e)) => {
                warn!("Picker produced an unusable selector on {}: {}", platform_id, e);
                PickerOutcome::Incomplete(e.to_string())
            }
            Err(e) => {
                warn!("Failed to save picker selection for {}: {}", session.hostname, e);
                PickerOutcome::Incomplete(e.to_string())
            }
        }
    }

    /// Feed controller notices into the picker until the controller goes away.
    ///
    /// A reload of the picking surface drops its instrumentation, so the
    /// session ends with it.
    pub fn spawn_listener(self: &Arc<Self>) -> JoinHandle<()> {
        let mut notices = self.controller.subscribe();
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            loop {
                let notice = match notices.recv().await {
                    Ok(notice) => notice,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Picker listener missed {} notice(s)", skipped);
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };
                let Some(picker) = weak.upgrade() else {
                    break;
                };
                match notice {
                    SurfaceNotice::PickerReport {
                        platform_id,
                        payload,
                    } => {
                        let outcome = picker.handle_report(&platform_id, &payload);
                        let _ = picker.outcomes.send(outcome);
                    }
                    SurfaceNotice::Reloading { platform_id, .. } if picker.is_active_on(&platform_id) => {
                        warn!("Surface {} reloaded during element picking, ending session", platform_id);
                        picker.session.write().take();
                        let _ = picker
                            .outcomes
                            .send(PickerOutcome::Incomplete("surface reloaded".to_string()));
                    }
                    _ => {}
                }
            }
        })
    }
}
