//! Browsing surfaces and their lifecycle.
//!
//! A surface is an isolated embedded browsing context rendering one
//! platform's web UI. The host runtime supplies surfaces through a
//! [`SurfaceFactory`]; each surface reports load, crash and hang events on
//! its own channel, and the [`SurfaceController`] turns those into the
//! per-platform state machine.

mod controller;

pub use controller::SurfaceController;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::events::ProfileAction;

/// Load failure code reported for navigations the surface itself aborted.
pub const ERR_ABORTED: i32 = -3;

/// Lifecycle of one platform's surface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Lifecycle {
    /// Never activated; no surface allocated.
    #[default]
    Uninitialized,
    Loading,
    Ready,
    /// Load failure or crash cap reached. Needs a manual reload.
    Errored,
    /// Crashed, automatic retry pending.
    Crashed,
}

impl std::fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Lifecycle::Uninitialized => write!(f, "uninitialized"),
            Lifecycle::Loading => write!(f, "loading"),
            Lifecycle::Ready => write!(f, "ready"),
            Lifecycle::Errored => write!(f, "errored"),
            Lifecycle::Crashed => write!(f, "crashed"),
        }
    }
}

/// Transient per-platform state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SurfaceState {
    pub lifecycle: Lifecycle,
    pub last_error: Option<String>,
    pub crash_retry_count: u32,
    /// `None` until a login check or partition change tells us.
    pub login_known: Option<bool>,
}

/// Events a surface reports to its owner.
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceEvent {
    LoadStarted,
    LoadFinished { url: String },
    LoadFailed { code: i32, description: String },
    /// Render process crashed or was killed.
    Crashed { reason: String },
    Unresponsive,
    Responsive,
    ConsoleMessage { message: String },
}

/// Errors reported by a surface implementation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SurfaceError {
    #[error("Surface has no addressable document")]
    NoDocument,

    #[error("Script error: {0}")]
    Script(String),

    #[error("Not supported by this surface: {0}")]
    Unsupported(String),

    #[error("Surface is closed")]
    Closed,

    #[error("Failed to create surface: {0}")]
    CreateFailed(String),

    #[error("Unknown platform: {0}")]
    UnknownPlatform(String),

    #[error("Surface not instantiated for platform: {0}")]
    NotInstantiated(String),
}

impl SurfaceError {
    pub fn code(&self) -> &'static str {
        match self {
            SurfaceError::NoDocument => "no_document",
            SurfaceError::Script(_) => "script_failed",
            SurfaceError::Unsupported(_) => "unsupported",
            SurfaceError::Closed => "surface_closed",
            SurfaceError::CreateFailed(_) => "create_failed",
            SurfaceError::UnknownPlatform(_) => "unknown_platform",
            SurfaceError::NotInstantiated(_) => "not_instantiated",
        }
    }
}

/// Script execution errors, as seen by callers of the controller.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExecError {
    /// No surface, or the surface has no document yet.
    #[error("Surface not ready: {0}")]
    NotReady(String),

    /// The script threw or the surface rejected it.
    #[error("Script threw: {0}")]
    Thrown(String),

    #[error("Script timed out after {0}ms")]
    Timeout(u64),
}

impl ExecError {
    pub fn code(&self) -> &'static str {
        match self {
            ExecError::NotReady(_) => "webview_not_ready",
            ExecError::Thrown(_) => "script_failed",
            ExecError::Timeout(_) => "timeout",
        }
    }
}

/// One live browsing surface. Every call is a message round-trip.
#[async_trait]
pub trait Surface: Send + Sync {
    /// Evaluate a script in the page and return its resolved value.
    async fn execute_script(&self, script: &str) -> Result<Value, SurfaceError>;

    /// Current document URL, `None` before the first document exists.
    async fn document_url(&self) -> Option<String>;

    /// Trigger the host's native paste into the focused element.
    async fn native_paste(&self) -> Result<(), SurfaceError>;

    async fn reload(&self) -> Result<(), SurfaceError>;

    /// Hidden surfaces may be throttled by the host.
    fn set_visible(&self, visible: bool);

    async fn focus(&self) -> Result<(), SurfaceError>;
}

/// What a new surface should load and which storage it binds to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfaceSpec {
    pub platform_id: String,
    pub url: String,
    pub partition: String,
}

/// A freshly created surface plus its event stream.
pub struct SurfaceHandle {
    pub surface: std::sync::Arc<dyn Surface>,
    pub events: mpsc::UnboundedReceiver<SurfaceEvent>,
}

/// Creates surfaces. Creation starts loading `spec.url`.
#[async_trait]
pub trait SurfaceFactory: Send + Sync {
    async fn create(&self, spec: &SurfaceSpec) -> Result<SurfaceHandle, SurfaceError>;
}

/// Why a surface is being reloaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "action")]
pub enum ReloadReason {
    CrashRetry,
    Manual,
    ProfileChange(ProfileAction),
}

/// Where a navigation request came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationKind {
    /// Same-surface navigation.
    InPage,
    /// Popup or new top-level window.
    NewWindow,
}

impl std::fmt::Display for NavigationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NavigationKind::InPage => write!(f, "navigation"),
            NavigationKind::NewWindow => write!(f, "popup"),
        }
    }
}

/// Outcome of intercepting a navigation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationVerdict {
    /// Let the surface proceed.
    Allow,
    /// Cancelled in the surface and opened in the external browser.
    OpenedExternally(String),
    /// Cancelled outright.
    Blocked,
}

/// Notifications broadcast by the controller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum SurfaceNotice {
    #[serde(rename_all = "camelCase")]
    StateChanged {
        platform_id: String,
        lifecycle: Lifecycle,
    },
    #[serde(rename_all = "camelCase")]
    CrashRetrying {
        platform_id: String,
        attempt: u32,
        max: u32,
    },
    #[serde(rename_all = "camelCase")]
    MaxCrashes { platform_id: String, max: u32 },
    #[serde(rename_all = "camelCase")]
    Unresponsive { platform_id: String },
    #[serde(rename_all = "camelCase")]
    Reloading {
        platform_id: String,
        partition: String,
        reason: ReloadReason,
        was_active_profile: bool,
    },
    #[serde(rename_all = "camelCase")]
    NavigationBlocked { platform_id: String, url: String },
    /// Raw picker payload, correlated by the element picker.
    #[serde(rename_all = "camelCase")]
    PickerReport { platform_id: String, payload: String },
}

impl SurfaceNotice {
    pub fn platform_id(&self) -> &str {
        match self {
            SurfaceNotice::StateChanged { platform_id, .. }
            | SurfaceNotice::CrashRetrying { platform_id, .. }
            | SurfaceNotice::MaxCrashes { platform_id, .. }
            | SurfaceNotice::Unresponsive { platform_id }
            | SurfaceNotice::Reloading { platform_id, .. }
            | SurfaceNotice::NavigationBlocked { platform_id, .. }
            | SurfaceNotice::PickerReport { platform_id, .. } => platform_id,
        }
    }
}
