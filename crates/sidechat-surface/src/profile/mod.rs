//! Account profiles and storage partitions.
//!
//! A profile is a named account created from a cookie export. Each profile
//! owns one storage partition derived from its id; the active profile's
//! partition (or the default partition when none is active) is what every
//! surface binds to.

mod cookies;
mod manager;

pub use cookies::{detect_target, CookieRecord};
pub use manager::ProfileManager;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::host::HostError;
use crate::store::StoreError;

/// Partition id bound to a profile. Stable for the profile's lifetime.
pub fn partition_for(profile_id: &str) -> String {
    format!("persist:profile-{}", profile_id)
}

/// A named account profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: String,
    pub name: String,
    pub detected_target: Option<String>,
    pub partition_id: String,
    pub created_at: DateTime<Utc>,
    pub cookies_updated_at: DateTime<Utc>,
    pub is_encrypted: bool,
    #[serde(default)]
    pub session_expired: bool,
    #[serde(default)]
    pub cookie_count: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportOutcome {
    pub profile: Profile,
    pub partition_id: String,
    pub detected_target: Option<String>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SwitchOutcome {
    pub partition_id: String,
    pub session_expired: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteOutcome {
    pub new_partition_id: String,
    pub was_active: bool,
}

/// Cookie import errors.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Profile name cannot be empty")]
    InvalidName,

    #[error("Invalid cookie export: {0}")]
    InvalidFormat(String),

    #[error("Cookie export contains no cookies")]
    Empty,

    #[error("Failed to load cookies into the partition: {0}")]
    CookieJar(#[from] HostError),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

impl ImportError {
    pub fn code(&self) -> &'static str {
        match self {
            ImportError::InvalidName => "invalid_name",
            ImportError::InvalidFormat(_) => "invalid_format",
            ImportError::Empty => "empty",
            ImportError::CookieJar(_) => "cookie_jar_failed",
            ImportError::Storage(_) => "storage_failed",
        }
    }
}

/// Profile switch errors.
#[derive(Debug, Error)]
pub enum SwitchError {
    #[error("Profile not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

impl SwitchError {
    pub fn code(&self) -> &'static str {
        match self {
            SwitchError::NotFound(_) => "profile_not_found",
            SwitchError::Storage(_) => "storage_failed",
        }
    }
}

/// Profile deletion errors.
#[derive(Debug, Error)]
pub enum DeleteError {
    #[error("Profile not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

impl DeleteError {
    pub fn code(&self) -> &'static str {
        match self {
            DeleteError::NotFound(_) => "profile_not_found",
            DeleteError::Storage(_) => "storage_failed",
        }
    }
}

/// Cookie export errors.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Profile not found: {0}")]
    NotFound(String),

    #[error("Failed to decrypt cookies: {0}")]
    Decrypt(#[from] HostError),

    #[error("Stored cookies are corrupt: {0}")]
    Corrupt(String),
}

impl ExportError {
    pub fn code(&self) -> &'static str {
        match self {
            ExportError::NotFound(_) => "profile_not_found",
            ExportError::Decrypt(_) => "decrypt_failed",
            ExportError::Corrupt(_) => "corrupt_cookies",
        }
    }
}

#[cfg(test)]
#[path = "profile_tests.rs"]
mod tests;
