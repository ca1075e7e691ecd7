//! End-to-end tests driving the assembled orchestrator against scripted
//! fake surfaces and a fake host bridge.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use sidechat_config::{Config, ConfigLoader};
use sidechat_surface::{
    CookieRecord, HostBridge, HostError, JsonFileStore, Lifecycle, Orchestrator, PickerOutcome,
    SendReport, Surface, SurfaceError, SurfaceEvent, SurfaceFactory, SurfaceHandle,
    SurfaceNotice, SurfaceSpec,
};

// ============================================================================
// Test Helpers
// ============================================================================

#[derive(Default)]
struct TestHost {
    encryption: bool,
    clipboard: Mutex<Option<String>>,
    jars: Mutex<HashMap<String, Vec<CookieRecord>>>,
}

#[async_trait]
impl HostBridge for TestHost {
    async fn write_clipboard_image(&self, data_url: &str) -> Result<(), HostError> {
        *self.clipboard.lock().unwrap() = Some(data_url.to_string());
        Ok(())
    }

    async fn clipboard_has_image(&self) -> bool {
        self.clipboard.lock().unwrap().is_some()
    }

    async fn open_external(&self, _url: &str) -> Result<(), HostError> {
        Ok(())
    }

    fn encryption_available(&self) -> bool {
        self.encryption
    }

    fn encrypt(&self, plaintext: &str) -> Result<Vec<u8>, HostError> {
        Ok(plaintext.bytes().map(|b| b.rotate_left(3)).collect())
    }

    fn decrypt(&self, ciphertext: &[u8]) -> Result<String, HostError> {
        String::from_utf8(ciphertext.iter().map(|b| b.rotate_right(3)).collect())
            .map_err(|e| HostError::Crypto(e.to_string()))
    }

    async fn import_cookies(&self, partition: &str, cookies: &[CookieRecord]) -> Result<usize, HostError> {
        self.jars
            .lock()
            .unwrap()
            .insert(partition.to_string(), cookies.to_vec());
        Ok(cookies.len())
    }

    async fn clear_partition(&self, partition: &str) -> Result<(), HostError> {
        self.jars.lock().unwrap().remove(partition);
        Ok(())
    }
}

/// Page model: whether the input exists decides what scripts return.
struct TestSurface {
    url: Mutex<Option<String>>,
    input_present: AtomicBool,
}

#[async_trait]
impl Surface for TestSurface {
    async fn execute_script(&self, _script: &str) -> Result<Value, SurfaceError> {
        if self.input_present.load(Ordering::SeqCst) {
            Ok(json!({ "success": true, "submitted": true }))
        } else {
            Ok(json!({ "success": false, "reason": "input_not_found" }))
        }
    }

    async fn document_url(&self) -> Option<String> {
        self.url.lock().unwrap().clone()
    }

    async fn native_paste(&self) -> Result<(), SurfaceError> {
        Err(SurfaceError::Unsupported("native paste".to_string()))
    }

    async fn reload(&self) -> Result<(), SurfaceError> {
        Ok(())
    }

    fn set_visible(&self, _visible: bool) {}

    async fn focus(&self) -> Result<(), SurfaceError> {
        Ok(())
    }
}

#[derive(Default)]
struct TestFactory {
    surfaces: Mutex<Vec<(SurfaceSpec, Arc<TestSurface>)>>,
    senders: Mutex<HashMap<String, mpsc::UnboundedSender<SurfaceEvent>>>,
}

impl TestFactory {
    fn latest(&self, platform_id: &str) -> Arc<TestSurface> {
        self.surfaces
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(spec, _)| spec.platform_id == platform_id)
            .map(|(_, s)| s.clone())
            .expect("surface created")
    }

    fn specs(&self) -> Vec<SurfaceSpec> {
        self.surfaces.lock().unwrap().iter().map(|(s, _)| s.clone()).collect()
    }

    fn send(&self, platform_id: &str, event: SurfaceEvent) {
        let senders = self.senders.lock().unwrap();
        senders[platform_id].send(event).unwrap();
    }
}

#[async_trait]
impl SurfaceFactory for TestFactory {
    async fn create(&self, spec: &SurfaceSpec) -> Result<SurfaceHandle, SurfaceError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let surface = Arc::new(TestSurface {
            url: Mutex::new(Some(spec.url.clone())),
            input_present: AtomicBool::new(true),
        });
        self.surfaces.lock().unwrap().push((spec.clone(), surface.clone()));
        self.senders.lock().unwrap().insert(spec.platform_id.clone(), tx);
        Ok(SurfaceHandle { surface, events: rx })
    }
}

fn test_config() -> Config {
    ConfigLoader::load_str(
        r#"
[surfaces]
crash_retry_delay_ms = 60000

[automation]
clipboard_settle_ms = 0
"#,
    )
    .unwrap()
}

fn orchestrator(dir: &std::path::Path, host: Arc<TestHost>, factory: Arc<TestFactory>) -> Orchestrator {
    let store = Arc::new(JsonFileStore::new(dir));
    let mut orchestrator = Orchestrator::new(&test_config(), store, host, factory).unwrap();
    orchestrator.start();
    orchestrator
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_import_switch_send_delete() {
    let dir = tempfile::tempdir().unwrap();
    let host = Arc::new(TestHost {
        encryption: true,
        ..TestHost::default()
    });
    let factory = Arc::new(TestFactory::default());
    let orch = orchestrator(dir.path(), host.clone(), factory.clone());

    orch.activate_default().await.unwrap();
    assert_eq!(factory.specs()[0].partition, "persist:default");

    let imported = orch
        .profiles()
        .import_cookies("Work", r#"[{"domain": "chatgpt.com", "name": "x", "value": "1"}]"#)
        .await
        .unwrap();
    assert_eq!(imported.detected_target.as_deref(), Some("chatgpt"));
    assert!(imported.profile.is_encrypted);
    assert_eq!(host.jars.lock().unwrap()[&imported.partition_id].len(), 1);

    orch.profiles().switch_profile(&imported.profile.id).unwrap();
    settle().await;
    assert_eq!(factory.specs().last().unwrap().partition, imported.partition_id);

    let result = orch.facade().send_text("hello").await;
    assert_eq!(
        serde_json::to_value(SendReport::from(&result)).unwrap(),
        json!({ "success": true, "mode": "click" })
    );

    let mut notices = orch.controller().subscribe();
    let deleted = orch.profiles().delete_profile(&imported.profile.id).await.unwrap();
    assert_eq!(deleted.new_partition_id, "persist:default");
    settle().await;

    let mut rebinds = 0;
    while let Ok(notice) = notices.try_recv() {
        if let SurfaceNotice::Reloading {
            was_active_profile,
            partition,
            ..
        } = notice
        {
            assert!(was_active_profile);
            assert_eq!(partition, "persist:default");
            rebinds += 1;
        }
    }
    assert_eq!(rebinds, 1);
    assert_eq!(orch.controller().snapshot("chatgpt").login_known, Some(false));
    assert!(!host.jars.lock().unwrap().contains_key(&imported.partition_id));
}

#[tokio::test]
async fn test_state_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let host = Arc::new(TestHost::default());

    let profile_id = {
        let orch = orchestrator(dir.path(), host.clone(), Arc::new(TestFactory::default()));
        let imported = orch
            .profiles()
            .import_cookies("Personal", r#"[{"domain": ".claude.ai", "name": "sessionKey", "value": "s"}]"#)
            .await
            .unwrap();
        orch.profiles().switch_profile(&imported.profile.id).unwrap();
        orch.add_custom_platform(sidechat_surface::CustomPlatform {
            name: "Intranet".to_string(),
            url: "https://chat.intranet.example/".to_string(),
            icon: None,
            input_selector: "textarea".to_string(),
            submit_selector: "button.go".to_string(),
            submission_mode: sidechat_surface::SubmissionMode::Click,
            domain_match_pattern: Some("chat.intranet.example".to_string()),
        })
        .unwrap();
        assert!(orch.controller().is_allowed_navigation("chat.intranet.example"));
        imported.profile.id
    };

    let factory = Arc::new(TestFactory::default());
    let orch = orchestrator(dir.path(), host, factory.clone());
    assert_eq!(orch.profiles().active_profile().unwrap().id, profile_id);
    assert!(orch.controller().is_allowed_navigation("chat.intranet.example"));

    orch.controller().activate("claude").await.unwrap();
    assert_eq!(factory.specs()[0].partition, format!("persist:profile-{}", profile_id));
    assert!(dir.path().join("profiles.json").exists());
    assert!(dir.path().join("custom-platforms.json").exists());
}

#[tokio::test]
async fn test_missing_input_is_a_result_not_a_panic() {
    let dir = tempfile::tempdir().unwrap();
    let factory = Arc::new(TestFactory::default());
    let orch = orchestrator(dir.path(), Arc::new(TestHost::default()), factory.clone());

    orch.activate_default().await.unwrap();
    factory.latest("chatgpt").input_present.store(false, Ordering::SeqCst);

    let result = orch.facade().send_text("hi").await;
    let report = SendReport::from(&result);
    assert!(!report.success);
    assert_eq!(report.error, Some("input_not_found"));
}

#[tokio::test]
async fn test_crash_events_through_the_event_stream() {
    let dir = tempfile::tempdir().unwrap();
    let factory = Arc::new(TestFactory::default());
    let orch = orchestrator(dir.path(), Arc::new(TestHost::default()), factory.clone());
    orch.controller().activate("gemini").await.unwrap();
    let mut notices = orch.controller().subscribe();

    for _ in 0..3 {
        factory.send(
            "gemini",
            SurfaceEvent::Crashed {
                reason: "crashed".to_string(),
            },
        );
    }
    settle().await;

    let mut retrying = 0;
    let mut max_crashes = 0;
    while let Ok(notice) = notices.try_recv() {
        match notice {
            SurfaceNotice::CrashRetrying { .. } => retrying += 1,
            SurfaceNotice::MaxCrashes { .. } => max_crashes += 1,
            _ => {}
        }
    }
    assert_eq!((retrying, max_crashes), (2, 1));
    assert_eq!(orch.controller().snapshot("gemini").lifecycle, Lifecycle::Errored);

    orch.controller().reload("gemini").await.unwrap();
    factory.send(
        "gemini",
        SurfaceEvent::LoadFinished {
            url: "https://gemini.google.com/app".to_string(),
        },
    );
    settle().await;
    let state = orch.controller().snapshot("gemini");
    assert_eq!(state.lifecycle, Lifecycle::Ready);
    assert_eq!(state.crash_retry_count, 0);
}

#[tokio::test]
async fn test_picker_report_saves_override() {
    let dir = tempfile::tempdir().unwrap();
    let factory = Arc::new(TestFactory::default());
    let orch = orchestrator(dir.path(), Arc::new(TestHost::default()), factory.clone());
    orch.activate_default().await.unwrap();
    let mut outcomes = orch.picker().subscribe();

    let session = orch.picker().start("chatgpt").await.unwrap();
    let payload = json!({ "token": session.token, "input": "textarea#composer", "submit": "button.send" });
    factory.send(
        "chatgpt",
        SurfaceEvent::ConsoleMessage {
            message: format!("__sidechat_picker__:{}", payload),
        },
    );

    let outcome = tokio::time::timeout(Duration::from_secs(1), outcomes.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(outcome, PickerOutcome::Saved(_)));
    let resolved = orch.facade().resolve_active().await.unwrap();
    assert_eq!(resolved.input_selector, "textarea#composer");
    assert!(dir.path().join("custom-selectors.json").exists());
}
