//! In-process lifecycle events.

use serde::Serialize;

/// Profile lifecycle actions, serialized with their channel names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProfileAction {
    #[serde(rename = "profile-created")]
    Created,
    #[serde(rename = "profile-switch")]
    Switch,
    #[serde(rename = "profile-deleted")]
    Deleted,
    #[serde(rename = "reset")]
    Reset,
    #[serde(rename = "import")]
    Import,
    #[serde(rename = "session-expired")]
    SessionExpired,
}

/// Broadcast by the profile manager whenever profiles or the active partition change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileEvent {
    pub action: ProfileAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partition: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_id: Option<String>,
    pub was_active_profile: bool,
}

impl ProfileEvent {
    pub fn new(action: ProfileAction) -> Self {
        Self {
            action,
            partition: None,
            target: None,
            profile_id: None,
            was_active_profile: false,
        }
    }

    pub fn with_partition(mut self, partition: impl Into<String>) -> Self {
        self.partition = Some(partition.into());
        self
    }

    pub fn with_target(mut self, target: Option<String>) -> Self {
        self.target = target;
        self
    }

    pub fn with_profile(mut self, profile_id: impl Into<String>) -> Self {
        self.profile_id = Some(profile_id.into());
        self
    }

    pub fn was_active(mut self, was_active: bool) -> Self {
        self.was_active_profile = was_active;
        self
    }

    /// Whether the active partition changed, so every surface must reload.
    pub fn requires_reload(&self) -> bool {
        match self.action {
            ProfileAction::Switch | ProfileAction::Reset => true,
            ProfileAction::Deleted | ProfileAction::Import => self.was_active_profile,
            ProfileAction::Created | ProfileAction::SessionExpired => false,
        }
    }
}
