//! Platform, override, navigation and script subcommand handlers.

use std::sync::Arc;

use sidechat_config::Config;
use sidechat_surface::guard::NavigationDecision;
use sidechat_surface::script::{PollTiming, TextSendPlan};
use sidechat_surface::{
    CustomPlatform, DocumentStore, NavigationGuard, PlatformRegistry, ScriptGenerator,
    SelectorOverride, SelectorOverrideStore,
};

use crate::cli::{NavAction, OverrideAction, PlatformAction, ScriptAction};

pub(crate) fn handle_platform_command(
    action: PlatformAction,
    store: Arc<dyn DocumentStore>,
) -> anyhow::Result<()> {
    let registry = PlatformRegistry::load(store)?;

    match action {
        PlatformAction::List { format } => {
            let platforms = registry.list();
            if format == "json" {
                println!("{}", serde_json::to_string_pretty(&platforms)?);
                return Ok(());
            }
            println!("{:<18} {:<16} {:<9} {}", "ID", "NAME", "MODE", "URL");
            println!("{}", "-".repeat(80));
            for p in platforms {
                let name = if p.is_custom {
                    format!("{} (custom)", p.display_name)
                } else {
                    p.display_name.clone()
                };
                println!("{:<18} {:<16} {:<9} {}", p.id, name, p.submission_mode.as_str(), p.url);
            }
        }
        PlatformAction::Add {
            name,
            url,
            input,
            submit,
            mode,
            pattern,
            icon,
        } => {
            let entry = registry.add_custom(CustomPlatform {
                name,
                url,
                icon,
                input_selector: input,
                submit_selector: submit,
                submission_mode: mode.into(),
                domain_match_pattern: pattern,
            })?;
            println!("Added {} ({})", entry.display_name, entry.id);
        }
        PlatformAction::Remove { platform_id } => {
            let removed = registry.remove_custom(&platform_id)?;
            println!("Removed {} ({})", removed.display_name, removed.id);
        }
        PlatformAction::Login { platform_id } => {
            let presentation = registry
                .login_presentation(&platform_id)
                .ok_or_else(|| anyhow::anyhow!("unknown platform: {}", platform_id))?;
            println!("{}", presentation.title);
            println!("{}", presentation.hint);
        }
    }

    Ok(())
}

pub(crate) fn handle_override_command(
    action: OverrideAction,
    config: &Config,
    store: Arc<dyn DocumentStore>,
) -> anyhow::Result<()> {
    let overrides = SelectorOverrideStore::load(store, config.automation.max_selector_len)?;

    match action {
        OverrideAction::List => {
            let list = overrides.list();
            if list.is_empty() {
                println!("No selector overrides.");
                return Ok(());
            }
            for o in list {
                println!("{} [{}]", o.hostname, o.submission_mode.as_str());
                println!("  input:  {}", o.input_selector);
                println!("  submit: {}", o.submit_selector);
                if let Some(wait_for) = &o.wait_for {
                    println!("  wait:   {}", wait_for);
                }
            }
        }
        OverrideAction::Set {
            hostname,
            input,
            submit,
            mode,
            wait_for,
        } => {
            let mut record = SelectorOverride::new(hostname, input, submit, mode.into());
            record.wait_for = wait_for;
            let hostname = record.hostname.clone();
            overrides.set(record)?;
            println!("Saved override for {}", hostname);
        }
        OverrideAction::Remove { hostname } => {
            if overrides.remove(&hostname)? {
                println!("Removed override for {}", hostname);
            } else {
                println!("No override for {}", hostname);
            }
        }
    }

    Ok(())
}

pub(crate) fn handle_nav_command(
    action: NavAction,
    config: &Config,
    store: Arc<dyn DocumentStore>,
) -> anyhow::Result<()> {
    let registry = PlatformRegistry::load(store)?;
    let guard = NavigationGuard::from_config(registry.domain_patterns(), &config.navigation);

    match action {
        NavAction::Check { urls } => {
            for url in urls {
                let verdict = match guard.classify(&url) {
                    NavigationDecision::AllowAuth => "allow (auth)",
                    NavigationDecision::Allow => "allow",
                    NavigationDecision::PassThrough => "pass-through",
                    NavigationDecision::External(_) => "external",
                    NavigationDecision::Blocked => "blocked",
                };
                println!("{:<14} {}", verdict, url);
            }
        }
    }

    Ok(())
}

pub(crate) fn handle_script_command(
    action: ScriptAction,
    config: &Config,
    store: Arc<dyn DocumentStore>,
) -> anyhow::Result<()> {
    let generator = ScriptGenerator::new(config.automation.max_selector_len);

    let script = match action {
        ScriptAction::Send {
            platform_id,
            text,
            no_submit,
        } => {
            let registry = PlatformRegistry::load(store.clone())?;
            let overrides = SelectorOverrideStore::load(store, config.automation.max_selector_len)?;
            let platform = registry
                .get(&platform_id)
                .ok_or_else(|| anyhow::anyhow!("unknown platform: {}", platform_id))?;
            let resolved = sidechat_surface::resolve_config(&platform, None, &overrides);
            let automation = &config.automation;
            generator.send_text(&TextSendPlan {
                input_selector: &resolved.input_selector,
                submit_selector: &resolved.submit_selector,
                ready_selector: resolved.wait_for.as_deref(),
                mode: resolved.submission_mode,
                text: &text,
                auto_submit: automation.auto_submit && !no_submit,
                input_timing: PollTiming::new(automation.input_wait_ms, automation.input_poll_ms),
                submit_timing: PollTiming::new(automation.submit_wait_text_ms, automation.submit_poll_ms),
            })?
        }
        ScriptAction::Picker { token } => {
            let token = token.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
            generator.picker_install(&token)?
        }
    };

    println!("{}", script);
    Ok(())
}
