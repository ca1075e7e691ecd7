use std::time::Duration;

use serde_json::json;
use sidechat_config::SurfacesConfig;
use tokio::sync::broadcast;

use super::*;
use crate::test_support::{Fixture, CHATGPT_EXPORT};

fn drain(rx: &mut broadcast::Receiver<SurfaceNotice>) -> Vec<SurfaceNotice> {
    let mut notices = Vec::new();
    while let Ok(notice) = rx.try_recv() {
        notices.push(notice);
    }
    notices
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}

fn reloading_count(notices: &[SurfaceNotice]) -> usize {
    notices
        .iter()
        .filter(|n| matches!(n, SurfaceNotice::Reloading { .. }))
        .count()
}

#[tokio::test]
async fn test_surfaces_are_created_lazily() {
    let fx = Fixture::without_retry_timer();
    assert_eq!(fx.controller.snapshot("gemini").lifecycle, Lifecycle::Uninitialized);
    assert!(fx.factory.created().is_empty());

    fx.controller.activate("gemini").await.unwrap();
    assert_eq!(fx.controller.snapshot("gemini").lifecycle, Lifecycle::Loading);
    assert_eq!(fx.controller.active_platform().as_deref(), Some("gemini"));
    assert_eq!(fx.controller.instantiated(), vec!["gemini".to_string()]);

    let surface = fx.factory.latest("gemini").unwrap();
    assert_eq!(surface.spec.partition, "persist:default");
    assert!(surface.is_visible());
}

#[tokio::test]
async fn test_activate_is_idempotent_and_switches_visibility() {
    let fx = Fixture::without_retry_timer();
    fx.controller.activate("chatgpt").await.unwrap();
    fx.controller.activate("claude").await.unwrap();
    fx.controller.activate("chatgpt").await.unwrap();

    assert_eq!(fx.factory.created().len(), 2);
    assert!(fx.factory.latest("chatgpt").unwrap().is_visible());
    assert!(!fx.factory.latest("claude").unwrap().is_visible());
    assert_eq!(fx.factory.latest("claude").unwrap().reloads(), 0);
}

#[tokio::test]
async fn test_activate_unknown_platform() {
    let fx = Fixture::without_retry_timer();
    assert_eq!(
        fx.controller.activate("nope").await,
        Err(SurfaceError::UnknownPlatform("nope".to_string()))
    );
    assert!(fx.controller.active_platform().is_none());
}

#[tokio::test]
async fn test_execute_script_outcomes() {
    let fx = Fixture::without_retry_timer();
    assert!(matches!(
        fx.controller.execute_script("chatgpt", "1", 1000).await,
        Err(ExecError::NotReady(_))
    ));

    fx.factory.respond_with(|script| match script {
        "throw" => Err(SurfaceError::Script("boom".to_string())),
        _ => Ok(json!({ "success": true })),
    });
    fx.controller.activate("chatgpt").await.unwrap();

    assert_eq!(
        fx.controller.execute_script("chatgpt", "ok", 1000).await,
        Ok(json!({ "success": true }))
    );
    assert_eq!(
        fx.controller.execute_script("chatgpt", "throw", 1000).await,
        Err(ExecError::Thrown("boom".to_string()))
    );

    fx.factory.latest("chatgpt").unwrap().set_url(None);
    let err = fx.controller.execute_script("chatgpt", "ok", 1000).await.unwrap_err();
    assert_eq!(err.code(), "webview_not_ready");
}

#[tokio::test(start_paused = true)]
async fn test_hung_surface_is_bounded() {
    let fx = Fixture::without_retry_timer();
    fx.controller.activate("chatgpt").await.unwrap();
    fx.factory.latest("chatgpt").unwrap().set_hung(true);

    let err = fx.controller.execute_script("chatgpt", "ok", 1500).await.unwrap_err();
    assert_eq!(err, ExecError::Timeout(1500));
    assert_eq!(fx.controller.document_url("chatgpt").await, None);
}

#[tokio::test]
async fn test_surface_operations_need_an_instance() {
    let fx = Fixture::without_retry_timer();
    let err = fx.controller.focus("claude").await.unwrap_err();
    assert_eq!(err, SurfaceError::NotInstantiated("claude".to_string()));
    assert_eq!(err.code(), "not_instantiated");

    fx.controller.activate("claude").await.unwrap();
    fx.controller.focus("claude").await.unwrap();
    assert_eq!(fx.factory.latest("claude").unwrap().focuses(), 1);
}

#[tokio::test]
async fn test_load_events_drive_lifecycle() {
    let fx = Fixture::without_retry_timer();
    fx.controller.activate("claude").await.unwrap();

    fx.controller.handle_event(
        "claude",
        SurfaceEvent::LoadFinished {
            url: "https://claude.ai/new".to_string(),
        },
    );
    assert_eq!(fx.controller.snapshot("claude").lifecycle, Lifecycle::Ready);

    fx.controller.handle_event("claude", SurfaceEvent::LoadStarted);
    assert_eq!(fx.controller.snapshot("claude").lifecycle, Lifecycle::Loading);

    fx.controller.handle_event(
        "claude",
        SurfaceEvent::LoadFailed {
            code: ERR_ABORTED,
            description: "ERR_ABORTED".to_string(),
        },
    );
    assert_eq!(fx.controller.snapshot("claude").lifecycle, Lifecycle::Loading);

    fx.controller.handle_event(
        "claude",
        SurfaceEvent::LoadFailed {
            code: -105,
            description: "ERR_NAME_NOT_RESOLVED".to_string(),
        },
    );
    let state = fx.controller.snapshot("claude");
    assert_eq!(state.lifecycle, Lifecycle::Errored);
    assert_eq!(state.last_error.as_deref(), Some("ERR_NAME_NOT_RESOLVED"));
}

#[tokio::test]
async fn test_landing_on_auth_page_marks_logged_out() {
    let fx = Fixture::without_retry_timer();
    fx.controller.activate("gemini").await.unwrap();
    fx.controller.handle_event(
        "gemini",
        SurfaceEvent::LoadFinished {
            url: "https://accounts.google.com/signin".to_string(),
        },
    );
    assert_eq!(fx.controller.snapshot("gemini").login_known, Some(false));

    fx.controller.record_login_state("gemini", true);
    assert_eq!(fx.controller.snapshot("gemini").login_known, Some(true));
}

#[tokio::test]
async fn test_crash_retry_cap() {
    let fx = Fixture::without_retry_timer();
    fx.controller.activate("gemini").await.unwrap();
    let mut notices = fx.controller.subscribe();

    for _ in 0..3 {
        fx.controller.on_crash("gemini", "render process gone");
    }
    let state = fx.controller.snapshot("gemini");
    assert_eq!(state.lifecycle, Lifecycle::Errored);
    assert_eq!(state.crash_retry_count, 3);

    let seen = drain(&mut notices);
    let retrying: Vec<u32> = seen
        .iter()
        .filter_map(|n| match n {
            SurfaceNotice::CrashRetrying { attempt, .. } => Some(*attempt),
            _ => None,
        })
        .collect();
    assert_eq!(retrying, vec![1, 2]);
    assert_eq!(
        seen.iter()
            .filter(|n| matches!(n, SurfaceNotice::MaxCrashes { .. }))
            .count(),
        1
    );

    // A fourth crash changes nothing and schedules nothing.
    fx.controller.on_crash("gemini", "render process gone");
    assert_eq!(fx.controller.snapshot("gemini").crash_retry_count, 3);
    assert!(drain(&mut notices).is_empty());
    assert_eq!(fx.factory.latest("gemini").unwrap().reloads(), 0);

    // Manual reload leaves the count until the surface is ready again.
    fx.controller.reload("gemini").await.unwrap();
    assert_eq!(fx.factory.latest("gemini").unwrap().reloads(), 1);
    let state = fx.controller.snapshot("gemini");
    assert_eq!(state.lifecycle, Lifecycle::Loading);
    assert_eq!(state.crash_retry_count, 3);

    fx.controller.handle_event(
        "gemini",
        SurfaceEvent::LoadFinished {
            url: "https://gemini.google.com/app".to_string(),
        },
    );
    let state = fx.controller.snapshot("gemini");
    assert_eq!(state.lifecycle, Lifecycle::Ready);
    assert_eq!(state.crash_retry_count, 0);
}

#[tokio::test]
async fn test_crash_retry_reloads_after_delay() {
    let fx = Fixture::new(SurfacesConfig {
        crash_retry_delay_ms: 10,
        ..SurfacesConfig::default()
    });
    fx.controller.activate("chatgpt").await.unwrap();
    fx.controller.on_crash("chatgpt", "oom");
    assert_eq!(fx.controller.snapshot("chatgpt").lifecycle, Lifecycle::Crashed);

    let surface = fx.factory.latest("chatgpt").unwrap();
    wait_until(|| surface.reloads() == 1).await;
    assert_eq!(fx.controller.snapshot("chatgpt").lifecycle, Lifecycle::Loading);
    assert_eq!(fx.controller.snapshot("chatgpt").crash_retry_count, 1);
}

#[tokio::test]
async fn test_manual_reload_supersedes_pending_retry() {
    let fx = Fixture::new(SurfacesConfig {
        crash_retry_delay_ms: 30,
        ..SurfacesConfig::default()
    });
    fx.controller.activate("chatgpt").await.unwrap();
    fx.controller.on_crash("chatgpt", "oom");
    fx.controller.reload("chatgpt").await.unwrap();

    tokio::time::sleep(Duration::from_millis(80)).await;
    assert_eq!(fx.factory.latest("chatgpt").unwrap().reloads(), 1);
}

#[tokio::test]
async fn test_unresponsive_is_a_warning_only() {
    let fx = Fixture::without_retry_timer();
    fx.controller.activate("chatgpt").await.unwrap();
    fx.controller.handle_event(
        "chatgpt",
        SurfaceEvent::LoadFinished {
            url: "https://chatgpt.com/".to_string(),
        },
    );
    fx.controller.on_crash("chatgpt", "killed");
    fx.controller.handle_event(
        "chatgpt",
        SurfaceEvent::LoadFinished {
            url: "https://chatgpt.com/".to_string(),
        },
    );
    let mut notices = fx.controller.subscribe();

    fx.controller.handle_event("chatgpt", SurfaceEvent::Unresponsive);
    assert_eq!(fx.controller.snapshot("chatgpt").lifecycle, Lifecycle::Ready);
    assert_eq!(
        drain(&mut notices),
        vec![SurfaceNotice::Unresponsive {
            platform_id: "chatgpt".to_string()
        }]
    );

    fx.controller.on_crash("chatgpt", "killed");
    assert_eq!(fx.controller.snapshot("chatgpt").crash_retry_count, 1);
    fx.controller.handle_event("chatgpt", SurfaceEvent::Responsive);
    assert_eq!(fx.controller.snapshot("chatgpt").crash_retry_count, 0);
}

#[tokio::test]
async fn test_event_stream_is_pumped() {
    let fx = Fixture::without_retry_timer();
    fx.controller.activate("deepseek").await.unwrap();
    fx.factory.send(
        "deepseek",
        SurfaceEvent::LoadFinished {
            url: "https://chat.deepseek.com/".to_string(),
        },
    );
    let controller = fx.controller.clone();
    wait_until(|| controller.snapshot("deepseek").lifecycle == Lifecycle::Ready).await;
}

#[tokio::test]
async fn test_picker_console_report_is_forwarded() {
    let fx = Fixture::without_retry_timer();
    fx.controller.activate("chatgpt").await.unwrap();
    let mut notices = fx.controller.subscribe();

    fx.controller.handle_event(
        "chatgpt",
        SurfaceEvent::ConsoleMessage {
            message: "just a log line".to_string(),
        },
    );
    fx.controller.handle_event(
        "chatgpt",
        SurfaceEvent::ConsoleMessage {
            message: format!("{}{{\"cancelled\":true}}", crate::script::PICKER_REPORT_PREFIX),
        },
    );
    assert_eq!(
        drain(&mut notices),
        vec![SurfaceNotice::PickerReport {
            platform_id: "chatgpt".to_string(),
            payload: "{\"cancelled\":true}".to_string(),
        }]
    );
}

#[tokio::test]
async fn test_deleting_active_profile_rebinds_every_surface() {
    let fx = Fixture::without_retry_timer();
    let imported = fx.profiles.import_cookies("Work", CHATGPT_EXPORT).await.unwrap();
    fx.profiles.switch_profile(&imported.profile.id).unwrap();

    fx.controller.activate("chatgpt").await.unwrap();
    fx.controller.activate("gemini").await.unwrap();
    assert_eq!(
        fx.controller.bound_partition("gemini").as_deref(),
        Some(imported.partition_id.as_str())
    );

    let _listener = fx.controller.spawn_profile_listener();
    let mut notices = fx.controller.subscribe();

    let deleted = fx.profiles.delete_profile(&imported.profile.id).await.unwrap();
    assert_eq!(deleted.new_partition_id, "persist:default");

    let factory = fx.factory.clone();
    wait_until(|| factory.created().len() == 4).await;

    let reloads: Vec<SurfaceNotice> = drain(&mut notices)
        .into_iter()
        .filter(|n| matches!(n, SurfaceNotice::Reloading { .. }))
        .collect();
    assert_eq!(reloads.len(), 2);
    for notice in &reloads {
        let SurfaceNotice::Reloading {
            partition,
            was_active_profile,
            reason,
            ..
        } = notice
        else {
            unreachable!()
        };
        assert_eq!(partition, "persist:default");
        assert!(*was_active_profile);
        assert_eq!(*reason, ReloadReason::ProfileChange(crate::events::ProfileAction::Deleted));
    }

    for platform in ["chatgpt", "gemini"] {
        assert_eq!(
            fx.controller.bound_partition(platform).as_deref(),
            Some("persist:default")
        );
        assert_eq!(fx.controller.snapshot(platform).login_known, Some(false));
        assert_eq!(fx.factory.latest(platform).unwrap().spec.partition, "persist:default");
    }
    // The visible surface stays the active platform's.
    assert!(fx.factory.latest("gemini").unwrap().is_visible());
    assert!(!fx.factory.latest("chatgpt").unwrap().is_visible());
}

#[tokio::test]
async fn test_switching_twice_reloads_once_per_call() {
    let fx = Fixture::without_retry_timer();
    let imported = fx.profiles.import_cookies("Work", CHATGPT_EXPORT).await.unwrap();
    fx.controller.activate("chatgpt").await.unwrap();

    let _listener = fx.controller.spawn_profile_listener();
    let mut notices = fx.controller.subscribe();

    let first = fx.profiles.switch_profile(&imported.profile.id).unwrap();
    let factory = fx.factory.clone();
    wait_until(|| factory.created().len() == 2).await;

    let second = fx.profiles.switch_profile(&imported.profile.id).unwrap();
    assert_eq!(first, second);
    let surface = fx.factory.latest("chatgpt").unwrap();
    wait_until(|| surface.reloads() == 1).await;

    assert_eq!(reloading_count(&drain(&mut notices)), 2);
    assert_eq!(fx.factory.created().len(), 2);
    assert_eq!(
        fx.controller.bound_partition("chatgpt").as_deref(),
        Some(first.partition_id.as_str())
    );
}

#[tokio::test]
async fn test_profile_creation_does_not_reload() {
    let fx = Fixture::without_retry_timer();
    fx.controller.activate("chatgpt").await.unwrap();
    let _listener = fx.controller.spawn_profile_listener();
    let mut notices = fx.controller.subscribe();

    fx.profiles.import_cookies("Spare", CHATGPT_EXPORT).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(reloading_count(&drain(&mut notices)), 0);
    assert_eq!(fx.factory.created().len(), 1);
}

#[tokio::test]
async fn test_navigation_requests() {
    let fx = Fixture::without_retry_timer();
    let controller = &fx.controller;

    assert_eq!(
        controller
            .on_navigation_request("chatgpt", "https://chatgpt.com/c/123", NavigationKind::InPage)
            .await,
        NavigationVerdict::Allow
    );
    assert_eq!(
        controller
            .on_navigation_request(
                "gemini",
                "https://accounts.google.com/o/oauth2",
                NavigationKind::NewWindow
            )
            .await,
        NavigationVerdict::Allow
    );
    assert_eq!(
        controller
            .on_navigation_request("chatgpt", "mailto:someone@example.com", NavigationKind::InPage)
            .await,
        NavigationVerdict::Allow
    );

    let mut notices = controller.subscribe();
    let verdict = controller
        .on_navigation_request("chatgpt", "https://evil.com/chatgpt.com", NavigationKind::NewWindow)
        .await;
    assert_eq!(
        verdict,
        NavigationVerdict::OpenedExternally("https://evil.com/chatgpt.com".to_string())
    );
    assert_eq!(fx.host.opened(), vec!["https://evil.com/chatgpt.com".to_string()]);
    assert_eq!(drain(&mut notices).len(), 1);

    assert_eq!(
        controller
            .on_navigation_request("chatgpt", "http://[::1", NavigationKind::InPage)
            .await,
        NavigationVerdict::Blocked
    );
    assert_eq!(fx.host.opened().len(), 1);
}

#[tokio::test]
async fn test_custom_platform_joins_allowlist_after_refresh() {
    let fx = Fixture::without_retry_timer();
    assert!(!fx.controller.is_allowed_navigation("chat.example.org"));

    fx.registry
        .add_custom(crate::registry::CustomPlatform {
            name: "Example".to_string(),
            url: "https://chat.example.org/".to_string(),
            icon: None,
            input_selector: "#prompt".to_string(),
            submit_selector: "button.send".to_string(),
            submission_mode: crate::registry::SubmissionMode::Click,
            domain_match_pattern: None,
        })
        .unwrap();
    fx.controller.refresh_navigation();
    assert!(fx.controller.is_allowed_navigation("chat.example.org"));
}
