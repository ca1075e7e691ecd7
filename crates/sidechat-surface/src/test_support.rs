//! Fakes shared by unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::{json, Value};
use sidechat_config::{NavigationConfig, ProfilesConfig, SurfacesConfig};
use tokio::sync::mpsc;

use crate::host::{HostBridge, HostError};
use crate::profile::{CookieRecord, ProfileManager};
use crate::registry::PlatformRegistry;
use crate::store::MemoryDocumentStore;
use crate::surface::{
    Surface, SurfaceController, SurfaceError, SurfaceEvent, SurfaceFactory, SurfaceHandle,
    SurfaceSpec,
};

const CIPHER_KEY: u8 = 0x5a;

#[derive(Default)]
pub struct FakeHost {
    encryption: AtomicBool,
    fail_cookie_import: AtomicBool,
    fail_clipboard: AtomicBool,
    drop_clipboard: AtomicBool,
    imported: Mutex<HashMap<String, usize>>,
    cleared: Mutex<Vec<String>>,
    opened: Mutex<Vec<String>>,
    clipboard: Mutex<Option<String>>,
}

impl FakeHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_encryption(&self, available: bool) {
        self.encryption.store(available, Ordering::SeqCst);
    }

    pub fn fail_cookie_import(&self, fail: bool) {
        self.fail_cookie_import.store(fail, Ordering::SeqCst);
    }

    pub fn fail_clipboard(&self, fail: bool) {
        self.fail_clipboard.store(fail, Ordering::SeqCst);
    }

    /// Accept clipboard writes but never hold the image.
    pub fn drop_clipboard(&self, drop: bool) {
        self.drop_clipboard.store(drop, Ordering::SeqCst);
    }

    pub fn imported_into(&self, partition: &str) -> usize {
        self.imported.lock().get(partition).copied().unwrap_or(0)
    }

    pub fn cleared(&self) -> Vec<String> {
        self.cleared.lock().clone()
    }

    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().clone()
    }

    pub fn clipboard(&self) -> Option<String> {
        self.clipboard.lock().clone()
    }
}

#[async_trait]
impl HostBridge for FakeHost {
    async fn write_clipboard_image(&self, data_url: &str) -> Result<(), HostError> {
        if self.fail_clipboard.load(Ordering::SeqCst) {
            return Err(HostError::Clipboard("clipboard locked".to_string()));
        }
        if !self.drop_clipboard.load(Ordering::SeqCst) {
            *self.clipboard.lock() = Some(data_url.to_string());
        }
        Ok(())
    }

    async fn clipboard_has_image(&self) -> bool {
        self.clipboard.lock().is_some()
    }

    async fn open_external(&self, url: &str) -> Result<(), HostError> {
        self.opened.lock().push(url.to_string());
        Ok(())
    }

    fn encryption_available(&self) -> bool {
        self.encryption.load(Ordering::SeqCst)
    }

    fn encrypt(&self, plaintext: &str) -> Result<Vec<u8>, HostError> {
        Ok(plaintext.bytes().rev().map(|b| b ^ CIPHER_KEY).collect())
    }

    fn decrypt(&self, ciphertext: &[u8]) -> Result<String, HostError> {
        let bytes: Vec<u8> = ciphertext.iter().rev().map(|b| b ^ CIPHER_KEY).collect();
        String::from_utf8(bytes).map_err(|e| HostError::Crypto(e.to_string()))
    }

    async fn import_cookies(&self, partition: &str, cookies: &[CookieRecord]) -> Result<usize, HostError> {
        if self.fail_cookie_import.load(Ordering::SeqCst) {
            return Err(HostError::Cookies("jar rejected cookies".to_string()));
        }
        *self.imported.lock().entry(partition.to_string()).or_default() += cookies.len();
        Ok(cookies.len())
    }

    async fn clear_partition(&self, partition: &str) -> Result<(), HostError> {
        self.cleared.lock().push(partition.to_string());
        Ok(())
    }
}

pub type Responder = Arc<dyn Fn(&str) -> Result<Value, SurfaceError> + Send + Sync>;

pub struct FakeSurface {
    pub spec: SurfaceSpec,
    url: Mutex<Option<String>>,
    responder: Responder,
    native_paste: Result<(), SurfaceError>,
    scripts: Mutex<Vec<String>>,
    reloads: AtomicU32,
    pastes: AtomicU32,
    focuses: AtomicU32,
    visible: AtomicBool,
    hung: AtomicBool,
}

impl FakeSurface {
    pub fn set_url(&self, url: Option<&str>) {
        *self.url.lock() = url.map(String::from);
    }

    pub fn scripts(&self) -> Vec<String> {
        self.scripts.lock().clone()
    }

    pub fn reloads(&self) -> u32 {
        self.reloads.load(Ordering::SeqCst)
    }

    pub fn pastes(&self) -> u32 {
        self.pastes.load(Ordering::SeqCst)
    }

    pub fn focuses(&self) -> u32 {
        self.focuses.load(Ordering::SeqCst)
    }

    /// Stop answering document queries, like a hung renderer.
    pub fn set_hung(&self, hung: bool) {
        self.hung.store(hung, Ordering::SeqCst);
    }

    pub fn is_visible(&self) -> bool {
        self.visible.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Surface for FakeSurface {
    async fn execute_script(&self, script: &str) -> Result<Value, SurfaceError> {
        self.scripts.lock().push(script.to_string());
        (self.responder)(script)
    }

    async fn document_url(&self) -> Option<String> {
        if self.hung.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        self.url.lock().clone()
    }

    async fn native_paste(&self) -> Result<(), SurfaceError> {
        self.pastes.fetch_add(1, Ordering::SeqCst);
        self.native_paste.clone()
    }

    async fn reload(&self) -> Result<(), SurfaceError> {
        self.reloads.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn set_visible(&self, visible: bool) {
        self.visible.store(visible, Ordering::SeqCst);
    }

    async fn focus(&self) -> Result<(), SurfaceError> {
        self.focuses.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct FakeFactory {
    responder: RwLock<Responder>,
    native_paste: RwLock<Result<(), SurfaceError>>,
    created: Mutex<Vec<Arc<FakeSurface>>>,
    senders: Mutex<HashMap<String, mpsc::UnboundedSender<SurfaceEvent>>>,
}

impl FakeFactory {
    pub fn new() -> Self {
        let responder: Responder = Arc::new(|_: &str| Ok(json!({ "success": true })));
        Self {
            responder: RwLock::new(responder),
            native_paste: RwLock::new(Ok(())),
            created: Mutex::new(Vec::new()),
            senders: Mutex::new(HashMap::new()),
        }
    }

    /// Responder used by surfaces created from now on.
    pub fn respond_with(&self, responder: impl Fn(&str) -> Result<Value, SurfaceError> + Send + Sync + 'static) {
        let responder: Responder = Arc::new(responder);
        *self.responder.write() = responder;
    }

    pub fn set_native_paste(&self, result: Result<(), SurfaceError>) {
        *self.native_paste.write() = result;
    }

    pub fn created(&self) -> Vec<Arc<FakeSurface>> {
        self.created.lock().clone()
    }

    pub fn latest(&self, platform_id: &str) -> Option<Arc<FakeSurface>> {
        self.created
            .lock()
            .iter()
            .rev()
            .find(|s| s.spec.platform_id == platform_id)
            .cloned()
    }

    pub fn send(&self, platform_id: &str, event: SurfaceEvent) {
        if let Some(tx) = self.senders.lock().get(platform_id) {
            let _ = tx.send(event);
        }
    }
}

#[async_trait]
impl SurfaceFactory for FakeFactory {
    async fn create(&self, spec: &SurfaceSpec) -> Result<SurfaceHandle, SurfaceError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let surface = Arc::new(FakeSurface {
            spec: spec.clone(),
            url: Mutex::new(Some(spec.url.clone())),
            responder: self.responder.read().clone(),
            native_paste: self.native_paste.read().clone(),
            scripts: Mutex::new(Vec::new()),
            reloads: AtomicU32::new(0),
            pastes: AtomicU32::new(0),
            focuses: AtomicU32::new(0),
            visible: AtomicBool::new(false),
            hung: AtomicBool::new(false),
        });
        self.created.lock().push(surface.clone());
        self.senders.lock().insert(spec.platform_id.clone(), tx);
        Ok(SurfaceHandle {
            surface,
            events: rx,
        })
    }
}

/// Wired-up orchestrator over in-memory fakes.
pub struct Fixture {
    pub store: Arc<MemoryDocumentStore>,
    pub host: Arc<FakeHost>,
    pub factory: Arc<FakeFactory>,
    pub registry: Arc<PlatformRegistry>,
    pub profiles: Arc<ProfileManager>,
    pub controller: Arc<SurfaceController>,
}

impl Fixture {
    pub fn new(surfaces: SurfacesConfig) -> Self {
        let store = Arc::new(MemoryDocumentStore::new());
        let host = Arc::new(FakeHost::new());
        let factory = Arc::new(FakeFactory::new());
        let registry = Arc::new(PlatformRegistry::load(store.clone()).unwrap());
        let profiles = Arc::new(
            ProfileManager::load(store.clone(), host.clone(), registry.clone(), ProfilesConfig::default())
                .unwrap(),
        );
        let controller = SurfaceController::new(
            factory.clone(),
            registry.clone(),
            profiles.clone(),
            host.clone(),
            surfaces,
            NavigationConfig::default(),
        );
        Self {
            store,
            host,
            factory,
            registry,
            profiles,
            controller,
        }
    }

    /// Crash retries far enough out that they never fire during a test.
    pub fn without_retry_timer() -> Self {
        Self::new(SurfacesConfig {
            crash_retry_delay_ms: 60_000,
            ..SurfacesConfig::default()
        })
    }
}

pub const CHATGPT_EXPORT: &str = r#"[{"domain": "chatgpt.com", "name": "x", "value": "1"}]"#;
