//! Host bridge: privileged operations proxied to the trusted host process.

use async_trait::async_trait;
use thiserror::Error;

use crate::profile::CookieRecord;

/// Host bridge errors.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("Clipboard error: {0}")]
    Clipboard(String),

    #[error("Failed to open external URL: {0}")]
    OpenExternal(String),

    #[error("Encryption is not available on this host")]
    EncryptionUnavailable,

    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error("Cookie store error: {0}")]
    Cookies(String),

    #[error("Not supported by this host: {0}")]
    Unsupported(String),
}

impl HostError {
    pub fn code(&self) -> &'static str {
        match self {
            HostError::Clipboard(_) => "clipboard_failed",
            HostError::OpenExternal(_) => "open_external_failed",
            HostError::EncryptionUnavailable => "encryption_unavailable",
            HostError::Crypto(_) => "crypto_failed",
            HostError::Cookies(_) => "cookie_jar_failed",
            HostError::Unsupported(_) => "unsupported",
        }
    }
}

/// Privileged operations the orchestrator cannot perform itself.
#[async_trait]
pub trait HostBridge: Send + Sync {
    /// Place an image (as a `data:image/...;base64,` URL) on the system clipboard.
    async fn write_clipboard_image(&self, data_url: &str) -> Result<(), HostError>;

    /// Whether the system clipboard currently holds an image.
    async fn clipboard_has_image(&self) -> bool;

    /// Open a URL in the system's external browser.
    async fn open_external(&self, url: &str) -> Result<(), HostError>;

    /// Whether OS-backed encryption is available for secrets at rest.
    fn encryption_available(&self) -> bool;

    fn encrypt(&self, plaintext: &str) -> Result<Vec<u8>, HostError>;

    fn decrypt(&self, ciphertext: &[u8]) -> Result<String, HostError>;

    /// Load cookies into a storage partition's cookie jar. Returns how many were accepted.
    async fn import_cookies(&self, partition: &str, cookies: &[CookieRecord]) -> Result<usize, HostError>;

    /// Drop all storage (cookies, local storage, cache) for a partition.
    async fn clear_partition(&self, partition: &str) -> Result<(), HostError>;
}
