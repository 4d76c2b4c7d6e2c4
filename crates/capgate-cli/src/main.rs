//! Capgate CLI - capability negotiation from the terminal.
//!
//! Drives the negotiation engine against a simulated platform authority whose
//! answers persist next to the consent history, so repeated runs behave like
//! an app asking a real operating system for permissions.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

use std::path::PathBuf;

use anyhow::{Context, Result};
use capgate_config::{LoadOptions, loader};
use capgate_grant::CapabilityKey;
use clap::{Parser, Subcommand};

mod commands;
mod config_bridge;
mod terminal_authority;
mod theme;

use commands::{AppContext, config, history, request, settings, status};

/// Capgate - negotiate capability grants
#[derive(Parser)]
#[command(name = "capgate")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file to use instead of ~/.capgate/config.toml
    #[arg(long, global = true, env = "CAPGATE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show grant state and consent history per capability
    Status {
        /// Capabilities to inspect (defaults to `negotiation.capabilities`)
        keys: Vec<String>,
    },

    /// Request capabilities and start the gated capture once granted
    Request {
        /// Capabilities to request (defaults to `negotiation.capabilities`)
        keys: Vec<String>,
    },

    /// Change answers the way the system settings screen would
    Settings {
        #[command(subcommand)]
        command: SettingsCommands,
    },

    /// List every capability that has ever been requested
    History,

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum SettingsCommands {
    /// Allow a capability
    Grant {
        /// Capability key
        key: String,
    },
    /// Deny a capability
    Deny {
        /// Capability key
        key: String,
    },
    /// Forget the answer for a capability
    Reset {
        /// Capability key
        key: String,
    },
    /// List every stored answer
    List,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show resolved configuration with source annotations
    Show {
        /// Output format (toml or json)
        #[arg(short, long, default_value = "toml")]
        format: String,
    },
    /// Show config file paths being checked
    Paths,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let workspace_root = std::env::current_dir().ok();
    let resolved = loader::load(&LoadOptions {
        workspace_root: workspace_root.clone(),
        capgate_home: None,
        config_file: cli.config.clone(),
    })
    .context("failed to load configuration")?;

    // Set up logging from config, with --verbose override.
    let mut log_config = config_bridge::to_log_config(&resolved.config);
    if cli.verbose {
        "debug".clone_into(&mut log_config.level);
    }
    let _log_guard = match capgate_telemetry::setup_logging(&log_config) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            None
        },
    };

    match cli.command {
        Commands::Config { command } => {
            handle_config(&resolved, &command, workspace_root.as_deref())?;
        },
        Commands::Status { keys } => {
            let keys = config_bridge::capability_keys(&resolved.config, &keys)?;
            let ctx = AppContext::open(resolved).await?;
            let result = status::show_status(&ctx, &keys).await;
            ctx.finish(result).await?;
        },
        Commands::Request { keys } => {
            let keys = config_bridge::capability_keys(&resolved.config, &keys)?;
            let ctx = AppContext::open(resolved).await?;
            let result = request::run_request(&ctx, &keys).await;
            ctx.finish(result).await?;
        },
        Commands::Settings { command } => {
            let ctx = AppContext::open(resolved).await?;
            let result = handle_settings(&ctx, command).await;
            ctx.finish(result).await?;
        },
        Commands::History => {
            let ctx = AppContext::open(resolved).await?;
            let result = history::show_history(&ctx).await;
            ctx.finish(result).await?;
        },
    }

    Ok(())
}

async fn handle_settings(ctx: &AppContext, command: SettingsCommands) -> Result<()> {
    match command {
        SettingsCommands::Grant { key } => settings::grant(ctx, &CapabilityKey::new(key)?).await,
        SettingsCommands::Deny { key } => settings::deny(ctx, &CapabilityKey::new(key)?).await,
        SettingsCommands::Reset { key } => settings::reset(ctx, &CapabilityKey::new(key)?).await,
        SettingsCommands::List => {
            settings::list(ctx);
            Ok(())
        },
    }
}

fn handle_config(
    resolved: &capgate_config::ResolvedConfig,
    command: &ConfigCommands,
    workspace_root: Option<&std::path::Path>,
) -> Result<()> {
    match command {
        ConfigCommands::Show { format } => config::show_config(resolved, format),
        ConfigCommands::Paths => {
            config::show_paths(resolved, workspace_root);
            Ok(())
        },
    }
}
