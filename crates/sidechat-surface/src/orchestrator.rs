//! Wires the registry, stores, profiles, surfaces, picker and facade together.

use std::sync::Arc;

use sidechat_config::Config;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::info;

use crate::facade::AutomationFacade;
use crate::host::HostBridge;
use crate::overrides::SelectorOverrideStore;
use crate::picker::ElementPicker;
use crate::profile::ProfileManager;
use crate::registry::{CustomPlatform, PlatformEntry, PlatformRegistry, RegistryError};
use crate::script::ScriptGenerator;
use crate::sequence::RequestSequence;
use crate::store::{DocumentStore, StoreError};
use crate::surface::{SurfaceController, SurfaceError, SurfaceFactory};

/// Startup errors.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
}

/// The assembled surface orchestrator.
pub struct Orchestrator {
    registry: Arc<PlatformRegistry>,
    overrides: Arc<SelectorOverrideStore>,
    profiles: Arc<ProfileManager>,
    controller: Arc<SurfaceController>,
    picker: Arc<ElementPicker>,
    facade: AutomationFacade,
    requests: RequestSequence,
    default_platform: String,
    listeners: Vec<JoinHandle<()>>,
}

impl Orchestrator {
    /// Load persisted state and build every component. No surface is created yet.
    pub fn new(
        config: &Config,
        store: Arc<dyn DocumentStore>,
        host: Arc<dyn HostBridge>,
        factory: Arc<dyn SurfaceFactory>,
    ) -> Result<Self, OrchestratorError> {
        let registry = Arc::new(PlatformRegistry::load(store.clone())?);
        let overrides = Arc::new(SelectorOverrideStore::load(
            store.clone(),
            config.automation.max_selector_len,
        )?);
        let profiles = Arc::new(ProfileManager::load(
            store,
            host.clone(),
            registry.clone(),
            config.profiles.clone(),
        )?);
        let controller = SurfaceController::new(
            factory,
            registry.clone(),
            profiles.clone(),
            host.clone(),
            config.surfaces.clone(),
            config.navigation.clone(),
        );
        let generator = ScriptGenerator::new(config.automation.max_selector_len);
        let script_timeout_ms = config.automation.input_wait_ms + config.automation.script_timeout_margin_ms;
        let picker = Arc::new(ElementPicker::new(
            controller.clone(),
            overrides.clone(),
            registry.clone(),
            generator,
            script_timeout_ms,
        ));
        let facade = AutomationFacade::new(
            registry.clone(),
            overrides.clone(),
            controller.clone(),
            picker.clone(),
            host,
            config.automation.clone(),
        );

        Ok(Self {
            registry,
            overrides,
            profiles,
            controller,
            picker,
            facade,
            requests: RequestSequence::new(),
            default_platform: config.surfaces.default_platform.clone(),
            listeners: Vec::new(),
        })
    }

    /// Subscribe the controller to profile events and the picker to surface
    /// notices. Must run inside a tokio runtime.
    pub fn start(&mut self) {
        if !self.listeners.is_empty() {
            return;
        }
        self.listeners.push(self.controller.spawn_profile_listener());
        self.listeners.push(self.picker.spawn_listener());
        info!(
            "Orchestrator started with {} platform(s), partition {}",
            self.registry.list().len(),
            self.profiles.active_partition()
        );
    }

    /// Activate the configured default platform.
    pub async fn activate_default(&self) -> Result<(), SurfaceError> {
        self.controller.activate(&self.default_platform).await
    }

    pub fn add_custom_platform(&self, custom: CustomPlatform) -> Result<PlatformEntry, RegistryError> {
        let entry = self.registry.add_custom(custom)?;
        self.controller.refresh_navigation();
        Ok(entry)
    }

    pub fn remove_custom_platform(&self, id: &str) -> Result<PlatformEntry, RegistryError> {
        let entry = self.registry.remove_custom(id)?;
        self.controller.refresh_navigation();
        Ok(entry)
    }

    pub fn registry(&self) -> &Arc<PlatformRegistry> {
        &self.registry
    }

    pub fn overrides(&self) -> &Arc<SelectorOverrideStore> {
        &self.overrides
    }

    pub fn profiles(&self) -> &Arc<ProfileManager> {
        &self.profiles
    }

    pub fn controller(&self) -> &Arc<SurfaceController> {
        &self.controller
    }

    pub fn picker(&self) -> &Arc<ElementPicker> {
        &self.picker
    }

    pub fn facade(&self) -> &AutomationFacade {
        &self.facade
    }

    pub fn requests(&self) -> &RequestSequence {
        &self.requests
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        for listener in &self.listeners {
            listener.abort();
        }
    }
}
