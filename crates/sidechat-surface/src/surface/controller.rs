//! SurfaceController: lazy creation, health tracking, crash retry and
//! partition rebinding for every platform's surface.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use sidechat_config::{NavigationConfig, SurfacesConfig};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::events::{ProfileAction, ProfileEvent};
use crate::guard::{hostname_of, NavigationDecision, NavigationGuard};
use crate::host::HostBridge;
use crate::profile::ProfileManager;
use crate::registry::PlatformRegistry;
use crate::script::PICKER_REPORT_PREFIX;

use super::{
    ExecError, Lifecycle, NavigationKind, NavigationVerdict, ReloadReason, Surface, SurfaceError,
    SurfaceEvent, SurfaceFactory, SurfaceHandle, SurfaceNotice, SurfaceSpec, SurfaceState,
    ERR_ABORTED,
};

const NOTICE_CAPACITY: usize = 128;
/// Upper bound for asking a surface which document it shows.
const DOCUMENT_QUERY_TIMEOUT: Duration = Duration::from_secs(2);

/// Event pump for one surface. Dropping it tears the subscription down.
struct Subscription(JoinHandle<()>);

impl Drop for Subscription {
    fn drop(&mut self) {
        self.0.abort();
    }
}

struct SurfaceEntry {
    surface: Arc<dyn Surface>,
    partition: String,
    state: SurfaceState,
    /// Identifies the surface instance; bumped whenever the surface is replaced.
    generation: u64,
    _subscription: Subscription,
}

/// Owns one surface per activated platform.
pub struct SurfaceController {
    this: Weak<SurfaceController>,
    factory: Arc<dyn SurfaceFactory>,
    registry: Arc<PlatformRegistry>,
    profiles: Arc<ProfileManager>,
    host: Arc<dyn HostBridge>,
    config: SurfacesConfig,
    navigation: NavigationConfig,
    guard: RwLock<NavigationGuard>,
    entries: Mutex<HashMap<String, SurfaceEntry>>,
    active: RwLock<Option<String>>,
    next_generation: AtomicU64,
    notices: broadcast::Sender<SurfaceNotice>,
}

impl SurfaceController {
    pub fn new(
        factory: Arc<dyn SurfaceFactory>,
        registry: Arc<PlatformRegistry>,
        profiles: Arc<ProfileManager>,
        host: Arc<dyn HostBridge>,
        config: SurfacesConfig,
        navigation: NavigationConfig,
    ) -> Arc<Self> {
        let guard = NavigationGuard::from_config(registry.domain_patterns(), &navigation);
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);
        Arc::new_cyclic(|this| Self {
            this: this.clone(),
            factory,
            registry,
            profiles,
            host,
            config,
            navigation,
            guard: RwLock::new(guard),
            entries: Mutex::new(HashMap::new()),
            active: RwLock::new(None),
            next_generation: AtomicU64::new(1),
            notices,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SurfaceNotice> {
        self.notices.subscribe()
    }

    pub fn active_platform(&self) -> Option<String> {
        self.active.read().clone()
    }

    /// State of a platform's surface; `Uninitialized` if never activated.
    pub fn snapshot(&self, platform_id: &str) -> SurfaceState {
        self.entries
            .lock()
            .get(platform_id)
            .map(|e| e.state.clone())
            .unwrap_or_default()
    }

    /// Platforms with an instantiated surface, sorted.
    pub fn instantiated(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.entries.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Partition a platform's surface is currently bound to.
    pub fn bound_partition(&self, platform_id: &str) -> Option<String> {
        self.entries.lock().get(platform_id).map(|e| e.partition.clone())
    }

    /// Show a platform's surface, creating it on first use.
    ///
    /// New surfaces bind to the partition that is active at creation time.
    pub async fn activate(&self, platform_id: &str) -> Result<(), SurfaceError> {
        let platform = self
            .registry
            .get(platform_id)
            .ok_or_else(|| SurfaceError::UnknownPlatform(platform_id.to_string()))?;

        let exists = self.entries.lock().contains_key(platform_id);
        if !exists {
            let spec = SurfaceSpec {
                platform_id: platform_id.to_string(),
                url: platform.url.clone(),
                partition: self.profiles.active_partition(),
            };
            let handle = self.factory.create(&spec).await?;

            let mut entries = self.entries.lock();
            if entries.contains_key(platform_id) {
                debug!("Surface for {} was created concurrently, dropping duplicate", platform_id);
            } else {
                let entry = self.new_entry(&spec, handle, SurfaceState {
                    lifecycle: Lifecycle::Loading,
                    ..SurfaceState::default()
                });
                entries.insert(platform_id.to_string(), entry);
                info!("Created surface for {} on partition {}", platform_id, spec.partition);
                self.emit(SurfaceNotice::StateChanged {
                    platform_id: platform_id.to_string(),
                    lifecycle: Lifecycle::Loading,
                });
            }
        }

        *self.active.write() = Some(platform_id.to_string());
        self.apply_visibility();
        Ok(())
    }

    /// Run a script in a platform's surface, bounded by `timeout_ms`.
    pub async fn execute_script(
        &self,
        platform_id: &str,
        script: &str,
        timeout_ms: u64,
    ) -> Result<Value, ExecError> {
        let surface = self
            .surface(platform_id)
            .ok_or_else(|| ExecError::NotReady(format!("no surface for {}", platform_id)))?;
        // A hung renderer can stall the readiness check as well as the script.
        let run = async {
            if surface.document_url().await.is_none() {
                return Err(SurfaceError::NoDocument);
            }
            surface.execute_script(script).await
        };
        match tokio::time::timeout(Duration::from_millis(timeout_ms), run).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(SurfaceError::NoDocument)) => {
                Err(ExecError::NotReady(format!("{} has no document yet", platform_id)))
            }
            Ok(Err(e @ SurfaceError::Closed)) => {
                Err(ExecError::NotReady(e.to_string()))
            }
            Ok(Err(SurfaceError::Script(message))) => Err(ExecError::Thrown(message)),
            Ok(Err(other)) => Err(ExecError::Thrown(other.to_string())),
            Err(_) => {
                warn!("Script on {} exceeded {}ms", platform_id, timeout_ms);
                Err(ExecError::Timeout(timeout_ms))
            }
        }
    }

    pub async fn document_url(&self, platform_id: &str) -> Option<String> {
        let surface = self.surface(platform_id)?;
        match tokio::time::timeout(DOCUMENT_QUERY_TIMEOUT, surface.document_url()).await {
            Ok(url) => url,
            Err(_) => {
                warn!("Surface {} did not report its document in time", platform_id);
                None
            }
        }
    }

    pub async fn native_paste(&self, platform_id: &str) -> Result<(), SurfaceError> {
        self.require_surface(platform_id)?.native_paste().await
    }

    pub async fn focus(&self, platform_id: &str) -> Result<(), SurfaceError> {
        self.require_surface(platform_id)?.focus().await
    }

    /// Manual retry. Also the only way out of a terminal `Errored` state.
    pub async fn reload(&self, platform_id: &str) -> Result<(), SurfaceError> {
        let (surface, generation) = {
            let mut entries = self.entries.lock();
            let entry = entries
                .get_mut(platform_id)
                .ok_or_else(|| SurfaceError::NotInstantiated(platform_id.to_string()))?;
            entry.state.lifecycle = Lifecycle::Loading;
            entry.state.last_error = None;
            self.emit(SurfaceNotice::StateChanged {
                platform_id: platform_id.to_string(),
                lifecycle: Lifecycle::Loading,
            });
            self.emit(SurfaceNotice::Reloading {
                platform_id: platform_id.to_string(),
                partition: entry.partition.clone(),
                reason: ReloadReason::Manual,
                was_active_profile: false,
            });
            (entry.surface.clone(), entry.generation)
        };

        info!("Manual reload of {}", platform_id);
        if let Err(e) = surface.reload().await {
            self.mark_errored(platform_id, generation, e.to_string());
            return Err(e);
        }
        Ok(())
    }

    /// Record what a login check found.
    pub fn record_login_state(&self, platform_id: &str, logged_in: bool) {
        if let Some(entry) = self.entries.lock().get_mut(platform_id) {
            entry.state.login_known = Some(logged_in);
        }
    }

    /// Apply an event from the current surface of `platform_id`.
    pub fn handle_event(&self, platform_id: &str, event: SurfaceEvent) {
        let generation = self.entries.lock().get(platform_id).map(|e| e.generation);
        match generation {
            Some(generation) => self.dispatch(platform_id, generation, event),
            None => debug!("Ignoring {:?} for uninstantiated {}", event, platform_id),
        }
    }

    fn dispatch(&self, platform_id: &str, generation: u64, event: SurfaceEvent) {
        match event {
            SurfaceEvent::LoadStarted => {
                self.transition(platform_id, generation, |state| {
                    state.lifecycle = Lifecycle::Loading;
                });
            }
            SurfaceEvent::LoadFinished { url } => {
                let on_auth_page = hostname_of(&url).is_some_and(|h| self.guard.read().is_auth_host(&h));
                self.transition(platform_id, generation, |state| {
                    state.lifecycle = Lifecycle::Ready;
                    state.last_error = None;
                    state.crash_retry_count = 0;
                    if on_auth_page {
                        state.login_known = Some(false);
                    }
                });
            }
            SurfaceEvent::LoadFailed { code, description } => {
                if code == ERR_ABORTED {
                    debug!("Aborted load on {} ignored", platform_id);
                    return;
                }
                warn!("Load failed on {}: {} ({})", platform_id, description, code);
                self.mark_errored(platform_id, generation, description);
            }
            SurfaceEvent::Crashed { reason } => self.crash(platform_id, generation, reason),
            SurfaceEvent::Unresponsive => {
                warn!("Surface {} is unresponsive", platform_id);
                self.emit(SurfaceNotice::Unresponsive {
                    platform_id: platform_id.to_string(),
                });
            }
            SurfaceEvent::Responsive => self.on_responsive_again(platform_id),
            SurfaceEvent::ConsoleMessage { message } => {
                if let Some(payload) = message.strip_prefix(PICKER_REPORT_PREFIX) {
                    self.emit(SurfaceNotice::PickerReport {
                        platform_id: platform_id.to_string(),
                        payload: payload.to_string(),
                    });
                }
            }
        }
    }

    /// Count a crash; retry after a delay under the cap, go terminal at it.
    pub fn on_crash(&self, platform_id: &str, reason: &str) {
        self.handle_event(
            platform_id,
            SurfaceEvent::Crashed {
                reason: reason.to_string(),
            },
        );
    }

    fn crash(&self, platform_id: &str, generation: u64, reason: String) {
        let max = self.config.crash_retry_limit;
        let mut entries = self.entries.lock();
        let Some(entry) = entries.get_mut(platform_id).filter(|e| e.generation == generation) else {
            return;
        };
        let state = &mut entry.state;
        if state.lifecycle == Lifecycle::Errored && state.crash_retry_count >= max {
            debug!("Ignoring crash on terminally errored {}", platform_id);
            return;
        }

        state.crash_retry_count = (state.crash_retry_count + 1).min(max);
        state.last_error = Some(reason.clone());
        let attempt = state.crash_retry_count;

        if attempt < max {
            state.lifecycle = Lifecycle::Crashed;
            warn!(
                "Surface {} crashed ({}), retry {}/{} in {}ms",
                platform_id, reason, attempt, max, self.config.crash_retry_delay_ms
            );
            self.emit(SurfaceNotice::StateChanged {
                platform_id: platform_id.to_string(),
                lifecycle: Lifecycle::Crashed,
            });
            self.emit(SurfaceNotice::CrashRetrying {
                platform_id: platform_id.to_string(),
                attempt,
                max,
            });
            drop(entries);
            self.schedule_crash_retry(platform_id, generation, attempt);
        } else {
            state.lifecycle = Lifecycle::Errored;
            warn!("Surface {} crashed {} times, giving up until manual reload", platform_id, max);
            self.emit(SurfaceNotice::StateChanged {
                platform_id: platform_id.to_string(),
                lifecycle: Lifecycle::Errored,
            });
            self.emit(SurfaceNotice::MaxCrashes {
                platform_id: platform_id.to_string(),
                max,
            });
        }
    }

    fn schedule_crash_retry(&self, platform_id: &str, generation: u64, attempt: u32) {
        let weak = self.this.clone();
        let platform_id = platform_id.to_string();
        let delay = Duration::from_millis(self.config.crash_retry_delay_ms);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(controller) = weak.upgrade() {
                controller.retry_after_crash(&platform_id, generation, attempt).await;
            }
        });
    }

    async fn retry_after_crash(&self, platform_id: &str, generation: u64, attempt: u32) {
        let surface = {
            let mut entries = self.entries.lock();
            let Some(entry) = entries.get_mut(platform_id) else {
                return;
            };
            let current = entry.generation == generation
                && entry.state.lifecycle == Lifecycle::Crashed
                && entry.state.crash_retry_count == attempt;
            if !current {
                debug!("Crash retry {} for {} superseded", attempt, platform_id);
                return;
            }
            entry.state.lifecycle = Lifecycle::Loading;
            self.emit(SurfaceNotice::StateChanged {
                platform_id: platform_id.to_string(),
                lifecycle: Lifecycle::Loading,
            });
            self.emit(SurfaceNotice::Reloading {
                platform_id: platform_id.to_string(),
                partition: entry.partition.clone(),
                reason: ReloadReason::CrashRetry,
                was_active_profile: false,
            });
            entry.surface.clone()
        };

        if let Err(e) = surface.reload().await {
            self.mark_errored(platform_id, generation, e.to_string());
        }
    }

    /// The surface recovered from a hang.
    pub fn on_responsive_again(&self, platform_id: &str) {
        if let Some(entry) = self.entries.lock().get_mut(platform_id) {
            if entry.state.crash_retry_count > 0 {
                debug!("Surface {} responsive again, clearing crash count", platform_id);
            }
            entry.state.crash_retry_count = 0;
        }
    }

    /// React to a profile lifecycle event.
    pub async fn handle_profile_event(&self, event: &ProfileEvent) {
        if event.action == ProfileAction::SessionExpired {
            if let Some(target) = &event.target {
                self.record_login_state(target, false);
            }
            return;
        }
        if event.requires_reload() {
            self.rebind_all(event).await;
        } else {
            debug!("Profile event {:?} needs no reload", event.action);
        }
    }

    /// Rebind every instantiated surface to the current active partition.
    ///
    /// Surfaces already on that partition reload in place; the rest are
    /// replaced, which tears down their old event subscription first.
    pub async fn rebind_all(&self, event: &ProfileEvent) {
        let partition = self.profiles.active_partition();
        let reason = ReloadReason::ProfileChange(event.action);
        let login_known = event.was_active_profile.then_some(false);

        let targets: Vec<(String, u64, Arc<dyn Surface>, String)> = self
            .entries
            .lock()
            .iter()
            .map(|(id, e)| (id.clone(), e.generation, e.surface.clone(), e.partition.clone()))
            .collect();
        info!(
            "Rebinding {} surface(s) to {} after {:?}",
            targets.len(),
            partition,
            event.action
        );

        for (platform_id, generation, surface, bound) in targets {
            self.emit(SurfaceNotice::Reloading {
                platform_id: platform_id.clone(),
                partition: partition.clone(),
                reason,
                was_active_profile: event.was_active_profile,
            });

            if bound == partition {
                self.transition(&platform_id, generation, |state| {
                    *state = SurfaceState {
                        lifecycle: Lifecycle::Loading,
                        login_known,
                        ..SurfaceState::default()
                    };
                });
                if let Err(e) = surface.reload().await {
                    self.mark_errored(&platform_id, generation, e.to_string());
                }
                continue;
            }

            let Some(platform) = self.registry.get(&platform_id) else {
                warn!("Platform {} vanished from the registry, dropping its surface", platform_id);
                self.entries.lock().remove(&platform_id);
                continue;
            };
            let spec = SurfaceSpec {
                platform_id: platform_id.clone(),
                url: platform.url,
                partition: partition.clone(),
            };
            match self.factory.create(&spec).await {
                Ok(handle) => {
                    let entry = self.new_entry(&spec, handle, SurfaceState {
                        lifecycle: Lifecycle::Loading,
                        login_known,
                        ..SurfaceState::default()
                    });
                    self.entries.lock().insert(platform_id.clone(), entry);
                    self.emit(SurfaceNotice::StateChanged {
                        platform_id,
                        lifecycle: Lifecycle::Loading,
                    });
                }
                Err(e) => {
                    warn!("Failed to recreate surface for {}: {}", platform_id, e);
                    self.mark_errored(&platform_id, generation, e.to_string());
                }
            }
        }

        self.apply_visibility();
    }

    /// Follow profile events until the manager goes away.
    pub fn spawn_profile_listener(self: &Arc<Self>) -> JoinHandle<()> {
        let mut events = self.profiles.subscribe();
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            loop {
                let event = match events.recv().await {
                    Ok(event) => event,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Missed {} profile event(s), rebinding all surfaces", skipped);
                        ProfileEvent::new(ProfileAction::Switch)
                    }
                    Err(RecvError::Closed) => break,
                };
                let Some(controller) = weak.upgrade() else {
                    break;
                };
                controller.handle_profile_event(&event).await;
            }
        })
    }

    /// Classify a navigation or popup request from a surface.
    ///
    /// Disallowed http(s) targets are cancelled and opened in the external
    /// browser instead.
    pub async fn on_navigation_request(
        &self,
        platform_id: &str,
        url: &str,
        kind: NavigationKind,
    ) -> NavigationVerdict {
        let decision = self.guard.read().classify(url);
        match decision {
            NavigationDecision::AllowAuth => {
                debug!("Auth {} from {} allowed: {}", kind, platform_id, url);
                NavigationVerdict::Allow
            }
            NavigationDecision::Allow | NavigationDecision::PassThrough => NavigationVerdict::Allow,
            NavigationDecision::External(target) => {
                warn!("Blocked {} from {} to {}, opening externally", kind, platform_id, target);
                self.emit(SurfaceNotice::NavigationBlocked {
                    platform_id: platform_id.to_string(),
                    url: target.clone(),
                });
                match self.host.open_external(&target).await {
                    Ok(()) => NavigationVerdict::OpenedExternally(target),
                    Err(e) => {
                        warn!("Failed to open {} externally: {}", target, e);
                        NavigationVerdict::Blocked
                    }
                }
            }
            NavigationDecision::Blocked => {
                warn!("Blocked unparseable {} from {}", kind, platform_id);
                self.emit(SurfaceNotice::NavigationBlocked {
                    platform_id: platform_id.to_string(),
                    url: url.to_string(),
                });
                NavigationVerdict::Blocked
            }
        }
    }

    /// Rebuild the navigation allowlist after the registry changed.
    pub fn refresh_navigation(&self) {
        let guard = NavigationGuard::from_config(self.registry.domain_patterns(), &self.navigation);
        *self.guard.write() = guard;
    }

    pub fn is_allowed_navigation(&self, host: &str) -> bool {
        self.guard.read().is_allowed_navigation(host)
    }

    fn new_entry(&self, spec: &SurfaceSpec, handle: SurfaceHandle, state: SurfaceState) -> SurfaceEntry {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let subscription = self.pump_events(&spec.platform_id, generation, handle.events);
        SurfaceEntry {
            surface: handle.surface,
            partition: spec.partition.clone(),
            state,
            generation,
            _subscription: subscription,
        }
    }

    fn pump_events(
        &self,
        platform_id: &str,
        generation: u64,
        mut events: mpsc::UnboundedReceiver<SurfaceEvent>,
    ) -> Subscription {
        let weak = self.this.clone();
        let platform_id = platform_id.to_string();
        Subscription(tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let Some(controller) = weak.upgrade() else {
                    break;
                };
                controller.dispatch(&platform_id, generation, event);
            }
            debug!("Event stream for {} (generation {}) closed", platform_id, generation);
        }))
    }

    fn transition(&self, platform_id: &str, generation: u64, apply: impl FnOnce(&mut SurfaceState)) {
        let mut entries = self.entries.lock();
        let Some(entry) = entries.get_mut(platform_id).filter(|e| e.generation == generation) else {
            return;
        };
        let before = entry.state.lifecycle;
        apply(&mut entry.state);
        let after = entry.state.lifecycle;
        if before != after {
            debug!("Surface {}: {} -> {}", platform_id, before, after);
            self.emit(SurfaceNotice::StateChanged {
                platform_id: platform_id.to_string(),
                lifecycle: after,
            });
        }
    }

    fn mark_errored(&self, platform_id: &str, generation: u64, error: String) {
        self.transition(platform_id, generation, |state| {
            state.lifecycle = Lifecycle::Errored;
            state.last_error = Some(error);
        });
    }

    fn apply_visibility(&self) {
        let active = self.active.read().clone();
        for (id, entry) in self.entries.lock().iter() {
            entry.surface.set_visible(active.as_deref() == Some(id.as_str()));
        }
    }

    fn surface(&self, platform_id: &str) -> Option<Arc<dyn Surface>> {
        self.entries.lock().get(platform_id).map(|e| e.surface.clone())
    }

    fn require_surface(&self, platform_id: &str) -> Result<Arc<dyn Surface>, SurfaceError> {
        self.surface(platform_id)
            .ok_or_else(|| SurfaceError::NotInstantiated(platform_id.to_string()))
    }

    fn emit(&self, notice: SurfaceNotice) {
        let _ = self.notices.send(notice);
    }
}

#[cfg(test)]
#[path = "controller_tests.rs"]
mod tests;
