//! Sidechat - multi-session AI surface orchestrator
//!
//! Command-line front-end for the orchestrator's persisted state: account
//! profiles, custom platforms, selector overrides, the navigation allowlist
//! and generated automation scripts.

mod adapters;
mod cli;
mod cmd_platform;
mod cmd_profile;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{debug, error};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use sidechat_config::{Config, ConfigLoader, ConfigValidator, LoggingConfig};
use sidechat_surface::{DocumentStore, HostBridge, JsonFileStore};

use adapters::DesktopHost;
use cli::{Cli, Commands, ConfigAction};

fn init_tracing(logging: &LoggingConfig, data_dir: &Path) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.level));

    // Console output stays on stderr so command output can be piped.
    let console = fmt::layer()
        .with_target(true)
        .with_writer(std::io::stderr);

    let file = if logging.file {
        let log_dir = data_dir.join("logs");
        std::fs::create_dir_all(&log_dir)
            .with_context(|| format!("creating {}", log_dir.display()))?;

        let file_appender = RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix("sidechat")
            .filename_suffix("log")
            .max_log_files(logging.max_log_files)
            .build(&log_dir)?;

        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        // Keep the worker alive for the program duration.
        static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
            std::sync::OnceLock::new();
        let _ = GUARD.set(guard);

        Some(fmt::layer().with_writer(non_blocking).with_ansi(false).boxed())
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console)
        .with(file)
        .init();

    Ok(())
}

fn load_config(path: Option<&Path>) -> anyhow::Result<(Config, PathBuf)> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(ConfigLoader::default_path);
    let config = ConfigLoader::load_or_default(&path)
        .with_context(|| format!("loading {}", path.display()))?;
    Ok((config, path))
}

fn handle_config_command(action: ConfigAction, config: &Config, path: &Path) -> anyhow::Result<()> {
    match action {
        ConfigAction::Validate => {
            let result = ConfigValidator::validate(config)?;
            for warning in &result.warnings {
                println!("warning: {}: {}", warning.path, warning.message);
            }
            for err in &result.errors {
                println!("error: {}: {}", err.path, err.message);
            }
            if !result.is_valid() {
                anyhow::bail!("{} has {} error(s)", path.display(), result.errors.len());
            }
            println!("{} is valid", path.display());
        }
        ConfigAction::Show => {
            println!("{}", toml::to_string_pretty(config)?);
        }
    }
    Ok(())
}

async fn run(cli: Cli, config: Config, config_path: PathBuf, data_dir: PathBuf) -> anyhow::Result<()> {
    let store: Arc<dyn DocumentStore> = Arc::new(JsonFileStore::new(&data_dir));
    let host: Arc<dyn HostBridge> = Arc::new(DesktopHost::new(&data_dir));
    debug!("Using data directory {}", data_dir.display());

    match cli.command {
        Commands::Profile { action } => {
            cmd_profile::handle_profile_command(action, &config, store, host).await
        }
        Commands::Platform { action } => cmd_platform::handle_platform_command(action, store),
        Commands::Override { action } => {
            cmd_platform::handle_override_command(action, &config, store)
        }
        Commands::Nav { action } => cmd_platform::handle_nav_command(action, &config, store),
        Commands::Script { action } => {
            cmd_platform::handle_script_command(action, &config, store)
        }
        Commands::Config { action } => handle_config_command(action, &config, &config_path),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let (config, config_path) = load_config(cli.config.as_deref())?;
    let data_dir = cli
        .data_dir
        .clone()
        .unwrap_or_else(|| config.storage.resolved_data_dir());

    init_tracing(&config.logging, &data_dir)?;

    let result = run(cli, config, config_path, data_dir).await;
    if let Err(e) = &result {
        error!("{:#}", e);
    }
    result
}
