//! Surface lifecycle, profile and navigation configuration.

use serde::{Deserialize, Serialize};

/// Surface lifecycle configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurfacesConfig {
    /// Consecutive crashes tolerated before a surface goes terminal.
    #[serde(default = "default_crash_retry_limit")]
    pub crash_retry_limit: u32,

    /// Fixed delay before an automatic crash reload.
    #[serde(default = "default_crash_retry_delay_ms")]
    pub crash_retry_delay_ms: u64,

    /// Platform shown when nothing else was selected.
    #[serde(default = "default_platform")]
    pub default_platform: String,
}

fn default_crash_retry_limit() -> u32 {
    3
}

fn default_crash_retry_delay_ms() -> u64 {
    1000
}

fn default_platform() -> String {
    "chatgpt".to_string()
}

impl Default for SurfacesConfig {
    fn default() -> Self {
        Self {
            crash_retry_limit: default_crash_retry_limit(),
            crash_retry_delay_ms: default_crash_retry_delay_ms(),
            default_platform: default_platform(),
        }
    }
}

/// Account profile configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfilesConfig {
    /// Partition used when no profile is active.
    #[serde(default = "default_partition")]
    pub default_partition: String,

    /// Imported cookies older than this are reported as an expired session.
    #[serde(default = "default_session_freshness_days")]
    pub session_freshness_days: u32,
}

fn default_partition() -> String {
    "persist:default".to_string()
}

fn default_session_freshness_days() -> u32 {
    30
}

impl Default for ProfilesConfig {
    fn default() -> Self {
        Self {
            default_partition: default_partition(),
            session_freshness_days: default_session_freshness_days(),
        }
    }
}

/// Navigation allowlist configuration.
///
/// Entries are host patterns: an exact host (`chatgpt.com`) or a wildcard
/// suffix (`*.openai.com`, which also matches `openai.com`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationConfig {
    /// Hosts allowed alongside the configured platform domains.
    #[serde(default = "default_companion_domains")]
    pub companion_domains: Vec<String>,

    /// Identity-provider hosts that are never intercepted.
    #[serde(default = "default_auth_domains")]
    pub auth_domains: Vec<String>,
}

fn default_companion_domains() -> Vec<String> {
    [
        "*.openai.com",
        "*.oaistatic.com",
        "*.oaiusercontent.com",
        "*.anthropic.com",
        "*.claude.ai",
        "*.googleusercontent.com",
        "*.gstatic.com",
        "*.deepseek.com",
        "*.perplexity.ai",
        "*.x.ai",
        "*.bing.com",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_auth_domains() -> Vec<String> {
    [
        "accounts.google.com",
        "accounts.youtube.com",
        "login.microsoftonline.com",
        "login.live.com",
        "appleid.apple.com",
        "auth.openai.com",
        "auth0.openai.com",
        "github.com",
        "*.clerk.accounts.dev",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            companion_domains: default_companion_domains(),
            auth_domains: default_auth_domains(),
        }
    }
}
