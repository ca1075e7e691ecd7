//! Profile subcommand handlers.

use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use tracing::{info, warn};

use sidechat_config::Config;
use sidechat_surface::{DocumentStore, HostBridge, PlatformRegistry, ProfileManager};

use crate::cli::ProfileAction;

pub(crate) async fn handle_profile_command(
    action: ProfileAction,
    config: &Config,
    store: Arc<dyn DocumentStore>,
    host: Arc<dyn HostBridge>,
) -> anyhow::Result<()> {
    let registry = Arc::new(PlatformRegistry::load(store.clone())?);
    let profiles = ProfileManager::load(store, host, registry, config.profiles.clone())?;

    match action {
        ProfileAction::Import { name, file } => {
            let raw = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("reading {}", file.display()))?;
            let outcome = profiles.import_cookies(&name, &raw).await?;
            for warning in &outcome.warnings {
                warn!("{}", warning);
                println!("warning: {}", warning);
            }
            println!(
                "Imported profile '{}' ({}) into {}",
                outcome.profile.name, outcome.profile.id, outcome.partition_id
            );
            if let Some(target) = &outcome.detected_target {
                println!("Detected platform: {}", target);
            }
        }
        ProfileAction::List { format } => {
            let list = profiles.list();
            if format == "json" {
                println!("{}", serde_json::to_string_pretty(&list)?);
                return Ok(());
            }
            if list.is_empty() {
                println!("No profiles. Active partition: {}", profiles.active_partition());
                return Ok(());
            }
            let active = profiles.active_profile().map(|p| p.id);
            println!(
                "  {:<38} {:<20} {:<10} {:<8} {}",
                "ID", "NAME", "TARGET", "COOKIES", "UPDATED"
            );
            println!("{}", "-".repeat(100));
            for profile in list {
                let marker = if active.as_deref() == Some(profile.id.as_str()) { "*" } else { " " };
                let target = profile.detected_target.as_deref().unwrap_or("-");
                let age = (Utc::now() - profile.cookies_updated_at).num_days();
                println!(
                    "{} {:<38} {:<20} {:<10} {:<8} {}d ago{}",
                    marker,
                    profile.id,
                    profile.name,
                    target,
                    profile.cookie_count,
                    age,
                    if profile.session_expired { " (expired)" } else { "" }
                );
            }
        }
        ProfileAction::Switch { profile_id } => {
            let outcome = profiles.switch_profile(&profile_id)?;
            println!("Active partition: {}", outcome.partition_id);
            if outcome.session_expired {
                println!("warning: the session may have expired; re-import fresh cookies");
            }
        }
        ProfileAction::Delete { profile_id } => {
            let outcome = profiles.delete_profile(&profile_id).await?;
            info!("Deleted profile {}", profile_id);
            println!("Deleted {}", profile_id);
            if outcome.was_active {
                println!("Active partition: {}", outcome.new_partition_id);
            }
        }
        ProfileAction::Reset => {
            let partition = profiles.reset_to_default()?;
            println!("Active partition: {}", partition);
        }
        ProfileAction::Export { profile_id } => {
            let cookies = profiles.export_cookies(&profile_id)?;
            println!("{}", serde_json::to_string_pretty(&cookies)?);
        }
    }

    Ok(())
}
