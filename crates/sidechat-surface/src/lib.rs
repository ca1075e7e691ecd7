//! # Sidechat Surface
//!
//! Multi-session AI surface orchestration: one isolated, cookie-scoped
//! browsing surface per AI platform, account profiles that choose the
//! storage partition those surfaces bind to, a navigation allowlist, and
//! generated automation scripts that insert content and submit it.
//!
//! The host runtime plugs in through two seams: [`surface::SurfaceFactory`]
//! creates browsing surfaces, and [`host::HostBridge`] performs privileged
//! operations (clipboard, external browser, secret encryption, cookie jars).

pub mod events;
pub mod facade;
pub mod guard;
pub mod host;
pub mod orchestrator;
pub mod overrides;
pub mod picker;
pub mod profile;
pub mod registry;
pub mod script;
pub mod sequence;
pub mod store;
pub mod surface;

#[cfg(test)]
mod test_support;

pub use events::{ProfileAction, ProfileEvent};
pub use facade::{resolve_config, AutomationFacade, ResolvedConfig, SendError, SendReceipt, SendReport};
pub use guard::{HostPattern, NavigationDecision, NavigationGuard};
pub use host::{HostBridge, HostError};
pub use orchestrator::{Orchestrator, OrchestratorError};
pub use overrides::{OverrideError, SelectorOverride, SelectorOverrideStore};
pub use picker::{ElementPicker, PickerError, PickerOutcome, PickerSession};
pub use profile::{
    CookieRecord, DeleteError, DeleteOutcome, ExportError, ImportError, ImportOutcome, Profile,
    ProfileManager, SwitchError, SwitchOutcome,
};
pub use registry::{
    CustomPlatform, LoginPresentation, LoginProvider, PlatformEntry, PlatformRegistry,
    RegistryError, SubmissionMode,
};
pub use script::{ScriptError, ScriptGenerator, SelectorError};
pub use sequence::RequestSequence;
pub use store::{DocumentStore, JsonFileStore, MemoryDocumentStore, StoreError};
pub use surface::{
    ExecError, Lifecycle, NavigationKind, NavigationVerdict, ReloadReason, Surface,
    SurfaceController, SurfaceError, SurfaceEvent, SurfaceFactory, SurfaceHandle, SurfaceNotice,
    SurfaceSpec, SurfaceState,
};
