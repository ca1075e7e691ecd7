//! ProfileManager: import, switch, delete, and the active partition pointer.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{Duration, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sidechat_config::ProfilesConfig;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::events::{ProfileAction, ProfileEvent};
use crate::host::HostBridge;
use crate::registry::PlatformRegistry;
use crate::store::{DocumentStore, StoreError, PROFILES_DOC};

use super::cookies::{detect_target, parse_cookie_export, CookieRecord};
use super::{
    partition_for, DeleteError, DeleteOutcome, ExportError, ImportError, ImportOutcome, Profile,
    SwitchError, SwitchOutcome,
};

const EVENT_CAPACITY: usize = 64;

/// Profile plus its stored cookie payload (base64 ciphertext or plain JSON).
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredProfile {
    #[serde(flatten)]
    profile: Profile,
    cookies: String,
}

#[derive(Debug, Clone, Default)]
struct ProfileState {
    profiles: Vec<StoredProfile>,
    active: Option<String>,
}

impl ProfileState {
    fn find(&self, id: &str) -> Option<&StoredProfile> {
        self.profiles.iter().find(|p| p.profile.id == id)
    }

    fn to_document(&self) -> Result<Value, StoreError> {
        Ok(json!({
            "profiles": serde_json::to_value(&self.profiles)?,
            "activeProfileId": self.active,
        }))
    }
}

/// Owns profiles and the process-wide active partition.
pub struct ProfileManager {
    store: Arc<dyn DocumentStore>,
    host: Arc<dyn HostBridge>,
    registry: Arc<PlatformRegistry>,
    config: ProfilesConfig,
    state: RwLock<ProfileState>,
    events: broadcast::Sender<ProfileEvent>,
}

impl ProfileManager {
    /// Load persisted profiles. Corrupt records are skipped.
    pub fn load(
        store: Arc<dyn DocumentStore>,
        host: Arc<dyn HostBridge>,
        registry: Arc<PlatformRegistry>,
        config: ProfilesConfig,
    ) -> Result<Self, StoreError> {
        let mut state = ProfileState::default();

        if let Some(doc) = store.load(PROFILES_DOC)? {
            if let Some(items) = doc.get("profiles").and_then(Value::as_array) {
                for item in items {
                    match serde_json::from_value::<StoredProfile>(item.clone()) {
                        Ok(stored) => state.profiles.push(stored),
                        Err(e) => warn!("Skipping corrupt profile record: {}", e),
                    }
                }
            }
            state.active = doc
                .get("activeProfileId")
                .and_then(Value::as_str)
                .filter(|id| state.profiles.iter().any(|p| p.profile.id == *id))
                .map(String::from);
        }

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        info!(
            "Loaded {} profile(s), active partition {}",
            state.profiles.len(),
            state
                .active
                .as_deref()
                .map(partition_for)
                .unwrap_or_else(|| config.default_partition.clone())
        );

        Ok(Self {
            store,
            host,
            registry,
            config,
            state: RwLock::new(state),
            events,
        })
    }

    /// Subscribe to profile lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<ProfileEvent> {
        self.events.subscribe()
    }

    pub fn default_partition(&self) -> &str {
        &self.config.default_partition
    }

    /// Partition every surface must bind to right now.
    pub fn active_partition(&self) -> String {
        let state = self.state.read();
        state
            .active
            .as_deref()
            .and_then(|id| state.find(id))
            .map(|p| p.profile.partition_id.clone())
            .unwrap_or_else(|| self.config.default_partition.clone())
    }

    pub fn active_profile(&self) -> Option<Profile> {
        let state = self.state.read();
        state
            .active
            .as_deref()
            .and_then(|id| state.find(id))
            .map(|p| p.profile.clone())
    }

    pub fn list(&self) -> Vec<Profile> {
        self.state.read().profiles.iter().map(|p| p.profile.clone()).collect()
    }

    pub fn get(&self, id: &str) -> Option<Profile> {
        self.state.read().find(id).map(|p| p.profile.clone())
    }

    /// Create a profile (or refresh the one with the same name) from a cookie export.
    pub async fn import_cookies(
        &self,
        profile_name: &str,
        raw_export: &str,
    ) -> Result<ImportOutcome, ImportError> {
        let name = profile_name.trim();
        if name.is_empty() {
            return Err(ImportError::InvalidName);
        }

        let parsed = parse_cookie_export(raw_export)?;
        let mut warnings = Vec::new();
        if parsed.skipped_without_name > 0 {
            warnings.push(format!(
                "Skipped {} cookie(s) without a name",
                parsed.skipped_without_name
            ));
        }
        let now = Utc::now();
        let expired = parsed
            .cookies
            .iter()
            .filter(|c| c.is_expired(now.timestamp() as f64))
            .count();
        if expired > 0 {
            warnings.push(format!("{} cookie(s) are already expired", expired));
        }

        let detected_target = detect_target(&parsed.cookies, &self.registry.list());
        if detected_target.is_none() {
            warnings.push(
                "Could not detect which platform these cookies belong to; \
                 the profile was created anyway"
                    .to_string(),
            );
        }

        let existing = {
            let state = self.state.read();
            state
                .profiles
                .iter()
                .find(|p| p.profile.name.eq_ignore_ascii_case(name))
                .map(|p| p.profile.clone())
        };
        let id = existing
            .as_ref()
            .map(|p| p.id.clone())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let partition_id = partition_for(&id);

        let (payload, is_encrypted) = self.seal_cookies(&parsed.cookies, &mut warnings)?;

        let accepted = self.host.import_cookies(&partition_id, &parsed.cookies).await?;
        debug!("Partition {} accepted {} cookie(s)", partition_id, accepted);

        let profile = Profile {
            id: id.clone(),
            name: name.to_string(),
            detected_target: detected_target.clone(),
            partition_id: partition_id.clone(),
            created_at: existing.as_ref().map(|p| p.created_at).unwrap_or(now),
            cookies_updated_at: now,
            is_encrypted,
            session_expired: false,
            cookie_count: parsed.cookies.len(),
        };

        let was_active = {
            let mut state = self.state.write();
            let mut next = state.clone();
            let stored = StoredProfile {
                profile: profile.clone(),
                cookies: payload,
            };
            match next.profiles.iter_mut().find(|p| p.profile.id == id) {
                Some(slot) => *slot = stored,
                None => next.profiles.push(stored),
            }
            self.commit(&mut state, next)?;
            state.active.as_deref() == Some(id.as_str())
        };

        let action = if existing.is_some() {
            warnings.push(format!("Updated existing profile '{}'", name));
            ProfileAction::Import
        } else {
            ProfileAction::Created
        };
        info!(
            "Imported {} cookie(s) into profile '{}' (target: {})",
            profile.cookie_count,
            name,
            detected_target.as_deref().unwrap_or("unknown")
        );
        self.emit(
            ProfileEvent::new(action)
                .with_partition(&partition_id)
                .with_target(detected_target.clone())
                .with_profile(&id)
                .was_active(was_active),
        );

        Ok(ImportOutcome {
            profile,
            partition_id,
            detected_target,
            warnings,
        })
    }

    /// Make a profile active.
    pub fn switch_profile(&self, profile_id: &str) -> Result<SwitchOutcome, SwitchError> {
        let (partition_id, session_expired, target) = {
            let mut state = self.state.write();
            let stored = state
                .find(profile_id)
                .ok_or_else(|| SwitchError::NotFound(profile_id.to_string()))?;
            let profile = &stored.profile;
            let stale = Utc::now() - profile.cookies_updated_at
                > Duration::days(i64::from(self.config.session_freshness_days));
            let result = (
                profile.partition_id.clone(),
                profile.session_expired || stale,
                profile.detected_target.clone(),
            );

            let mut next = state.clone();
            next.active = Some(profile_id.to_string());
            self.commit(&mut state, next)?;
            result
        };

        info!("Switched to profile {} (partition {})", profile_id, partition_id);
        self.emit(
            ProfileEvent::new(ProfileAction::Switch)
                .with_partition(&partition_id)
                .with_target(target.clone())
                .with_profile(profile_id),
        );
        if session_expired {
            self.emit(
                ProfileEvent::new(ProfileAction::SessionExpired)
                    .with_partition(&partition_id)
                    .with_target(target)
                    .with_profile(profile_id)
                    .was_active(true),
            );
        }

        Ok(SwitchOutcome {
            partition_id,
            session_expired,
        })
    }

    /// Delete a profile and drop its partition's storage.
    pub async fn delete_profile(&self, profile_id: &str) -> Result<DeleteOutcome, DeleteError> {
        let (removed, was_active) = {
            let mut state = self.state.write();
            let index = state
                .profiles
                .iter()
                .position(|p| p.profile.id == profile_id)
                .ok_or_else(|| DeleteError::NotFound(profile_id.to_string()))?;

            let mut next = state.clone();
            let removed = next.profiles.remove(index);
            let was_active = next.active.as_deref() == Some(profile_id);
            if was_active {
                next.active = None;
            }
            self.commit(&mut state, next)?;
            (removed.profile, was_active)
        };

        if let Err(e) = self.host.clear_partition(&removed.partition_id).await {
            warn!("Failed to clear partition {}: {}", removed.partition_id, e);
        }

        let new_partition_id = self.active_partition();
        info!(
            "Deleted profile {} (was active: {}), partition now {}",
            profile_id, was_active, new_partition_id
        );
        self.emit(
            ProfileEvent::new(ProfileAction::Deleted)
                .with_partition(&new_partition_id)
                .with_target(removed.detected_target)
                .with_profile(profile_id)
                .was_active(was_active),
        );

        Ok(DeleteOutcome {
            new_partition_id,
            was_active,
        })
    }

    /// Deactivate any profile and fall back to the default partition.
    pub fn reset_to_default(&self) -> Result<String, StoreError> {
        {
            let mut state = self.state.write();
            let mut next = state.clone();
            next.active = None;
            self.commit(&mut state, next)?;
        }
        let partition = self.config.default_partition.clone();
        info!("Reset to default partition {}", partition);
        self.emit(ProfileEvent::new(ProfileAction::Reset).with_partition(&partition));
        Ok(partition)
    }

    /// Record that a surface observed the profile's login as expired.
    pub fn mark_session_expired(&self, profile_id: &str) -> Result<(), SwitchError> {
        let (partition, target, was_active) = {
            let mut state = self.state.write();
            let mut next = state.clone();
            let stored = next
                .profiles
                .iter_mut()
                .find(|p| p.profile.id == profile_id)
                .ok_or_else(|| SwitchError::NotFound(profile_id.to_string()))?;
            stored.profile.session_expired = true;
            let info = (
                stored.profile.partition_id.clone(),
                stored.profile.detected_target.clone(),
                next.active.as_deref() == Some(profile_id),
            );
            self.commit(&mut state, next)?;
            info
        };

        warn!("Session expired for profile {}", profile_id);
        self.emit(
            ProfileEvent::new(ProfileAction::SessionExpired)
                .with_partition(partition)
                .with_target(target)
                .with_profile(profile_id)
                .was_active(was_active),
        );
        Ok(())
    }

    /// Decrypt and return a profile's stored cookies.
    pub fn export_cookies(&self, profile_id: &str) -> Result<Vec<CookieRecord>, ExportError> {
        let stored = self
            .state
            .read()
            .find(profile_id)
            .cloned()
            .ok_or_else(|| ExportError::NotFound(profile_id.to_string()))?;

        let json = if stored.profile.is_encrypted {
            let bytes = BASE64
                .decode(stored.cookies.as_bytes())
                .map_err(|e| ExportError::Corrupt(e.to_string()))?;
            self.host.decrypt(&bytes)?
        } else {
            stored.cookies
        };
        serde_json::from_str(&json).map_err(|e| ExportError::Corrupt(e.to_string()))
    }

    fn seal_cookies(
        &self,
        cookies: &[CookieRecord],
        warnings: &mut Vec<String>,
    ) -> Result<(String, bool), ImportError> {
        let json = serde_json::to_string(cookies).map_err(StoreError::from)?;
        if !self.host.encryption_available() {
            return Ok((json, false));
        }
        match self.host.encrypt(&json) {
            Ok(bytes) => Ok((BASE64.encode(bytes), true)),
            Err(e) => {
                warn!("Cookie encryption failed, storing unencrypted: {}", e);
                warnings.push("Cookies are stored unencrypted because encryption failed".to_string());
                Ok((json, false))
            }
        }
    }

    /// Persist `next`, then make it current.
    fn commit(&self, state: &mut ProfileState, next: ProfileState) -> Result<(), StoreError> {
        self.store.save(PROFILES_DOC, &next.to_document()?)?;
        *state = next;
        Ok(())
    }

    fn emit(&self, event: ProfileEvent) {
        debug!("Profile event: {:?}", event.action);
        let _ = self.events.send(event);
    }
}
