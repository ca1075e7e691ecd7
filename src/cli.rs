//! CLI definitions for Sidechat.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use sidechat_surface::SubmissionMode;

/// Sidechat CLI.
#[derive(Parser)]
#[command(name = "sidechat")]
#[command(about = "Multi-session AI surface orchestrator")]
#[command(version)]
pub(crate) struct Cli {
    /// Configuration file path (default: ~/.sidechat/config.toml)
    #[arg(short, long, env = "SIDECHAT_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Override the data directory from the config file
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Account profile management
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },

    /// Platform registry commands
    Platform {
        #[command(subcommand)]
        action: PlatformAction,
    },

    /// Per-hostname selector overrides
    Override {
        #[command(subcommand)]
        action: OverrideAction,
    },

    /// Navigation allowlist commands
    Nav {
        #[command(subcommand)]
        action: NavAction,
    },

    /// Print generated automation scripts
    Script {
        #[command(subcommand)]
        action: ScriptAction,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub(crate) enum ProfileAction {
    /// Import a browser cookie export (JSON array) as a profile
    Import {
        /// Profile name
        name: String,

        /// Path to the cookie export file
        file: PathBuf,
    },

    /// List profiles
    List {
        /// Output format (table, json)
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Make a profile active
    Switch {
        /// Profile ID
        profile_id: String,
    },

    /// Delete a profile and its storage partition
    Delete {
        /// Profile ID
        profile_id: String,
    },

    /// Go back to the default partition
    Reset,

    /// Print a profile's stored cookies as JSON
    Export {
        /// Profile ID
        profile_id: String,
    },
}

#[derive(Subcommand)]
pub(crate) enum PlatformAction {
    /// List built-in and custom platforms
    List {
        /// Output format (table, json)
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Add a custom platform
    Add {
        /// Display name
        name: String,

        /// Start URL
        url: String,

        /// CSS selector of the input
        #[arg(long)]
        input: String,

        /// CSS selector of the send control
        #[arg(long)]
        submit: String,

        #[arg(long, value_enum, default_value = "click")]
        mode: ModeArg,

        /// Host pattern the page must match (defaults to the URL's host)
        #[arg(long)]
        pattern: Option<String>,

        #[arg(long)]
        icon: Option<String>,
    },

    /// Remove a custom platform
    Remove {
        /// Platform ID
        platform_id: String,
    },

    /// Show the login prompt for a platform
    Login {
        /// Platform ID
        platform_id: String,
    },
}

#[derive(Subcommand)]
pub(crate) enum OverrideAction {
    /// List saved overrides
    List,

    /// Save an override for a hostname
    Set {
        /// Hostname, e.g. chatgpt.com
        hostname: String,

        #[arg(long)]
        input: String,

        #[arg(long)]
        submit: String,

        #[arg(long, value_enum, default_value = "click")]
        mode: ModeArg,

        /// Element that must exist before the input is used
        #[arg(long)]
        wait_for: Option<String>,
    },

    /// Remove the override for a hostname
    Remove {
        hostname: String,
    },
}

#[derive(Subcommand)]
pub(crate) enum NavAction {
    /// Classify URLs against the navigation allowlist
    Check {
        #[arg(required = true)]
        urls: Vec<String>,
    },
}

#[derive(Subcommand)]
pub(crate) enum ScriptAction {
    /// Script that inserts text into a platform's input (and submits it)
    Send {
        /// Platform ID
        platform_id: String,

        /// Text to insert
        text: String,

        /// Insert only, do not submit
        #[arg(long)]
        no_submit: bool,
    },

    /// Element picker instrumentation script
    Picker {
        /// Correlation token (random when omitted)
        #[arg(long)]
        token: Option<String>,
    },
}

#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Validate the configuration file
    Validate,

    /// Print the effective configuration as TOML
    Show,
}

#[derive(Clone, Copy, ValueEnum)]
pub(crate) enum ModeArg {
    Click,
    EnterKey,
}

impl From<ModeArg> for SubmissionMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Click => SubmissionMode::Click,
            ModeArg::EnterKey => SubmissionMode::EnterKey,
        }
    }
}
