//! Host bridge for running outside an embedding shell.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info};

use sidechat_surface::{CookieRecord, HostBridge, HostError};

/// Desktop host: cookie jars are JSON files under `<data_dir>/partitions`,
/// external URLs go to the platform opener. There is no clipboard or
/// secret store, so cookies are kept in plaintext.
pub(crate) struct DesktopHost {
    partitions_dir: PathBuf,
}

impl DesktopHost {
    pub(crate) fn new(data_dir: &Path) -> Self {
        Self {
            partitions_dir: data_dir.join("partitions"),
        }
    }

    fn jar_path(&self, partition: &str) -> PathBuf {
        let file: String = partition
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        self.partitions_dir.join(format!("{}.json", file))
    }
}

fn opener() -> (&'static str, &'static [&'static str]) {
    if cfg!(target_os = "macos") {
        ("open", &[])
    } else if cfg!(target_os = "windows") {
        ("cmd", &["/C", "start", ""])
    } else {
        ("xdg-open", &[])
    }
}

#[async_trait]
impl HostBridge for DesktopHost {
    async fn write_clipboard_image(&self, _data_url: &str) -> Result<(), HostError> {
        Err(HostError::Unsupported("clipboard image write".to_string()))
    }

    async fn clipboard_has_image(&self) -> bool {
        false
    }

    async fn open_external(&self, url: &str) -> Result<(), HostError> {
        let (program, args) = opener();
        let status = tokio::process::Command::new(program)
            .args(args)
            .arg(url)
            .status()
            .await
            .map_err(|e| HostError::OpenExternal(e.to_string()))?;
        if !status.success() {
            return Err(HostError::OpenExternal(format!("{} exited with {}", program, status)));
        }
        info!("Opened {} externally", url);
        Ok(())
    }

    fn encryption_available(&self) -> bool {
        false
    }

    fn encrypt(&self, _plaintext: &str) -> Result<Vec<u8>, HostError> {
        Err(HostError::EncryptionUnavailable)
    }

    fn decrypt(&self, _ciphertext: &[u8]) -> Result<String, HostError> {
        Err(HostError::EncryptionUnavailable)
    }

    async fn import_cookies(&self, partition: &str, cookies: &[CookieRecord]) -> Result<usize, HostError> {
        tokio::fs::create_dir_all(&self.partitions_dir)
            .await
            .map_err(|e| HostError::Cookies(e.to_string()))?;
        let body = serde_json::to_vec_pretty(cookies).map_err(|e| HostError::Cookies(e.to_string()))?;
        let path = self.jar_path(partition);
        tokio::fs::write(&path, body)
            .await
            .map_err(|e| HostError::Cookies(e.to_string()))?;
        debug!("Wrote {} cookie(s) to {}", cookies.len(), path.display());
        Ok(cookies.len())
    }

    async fn clear_partition(&self, partition: &str) -> Result<(), HostError> {
        match tokio::fs::remove_file(self.jar_path(partition)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(HostError::Cookies(e.to_string())),
        }
    }
}
