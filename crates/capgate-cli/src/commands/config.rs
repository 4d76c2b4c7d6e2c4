//! Config command: inspect the resolved configuration.

use anyhow::{Context, Result};
use capgate_config::ResolvedConfig;
use capgate_config::loader::CAPGATE_DIR;

use crate::theme::Theme;

/// Print the resolved configuration as annotated TOML or as JSON.
pub(crate) fn show_config(resolved: &ResolvedConfig, format: &str) -> Result<()> {
    let rendered = match format {
        "json" => serde_json::to_string_pretty(&resolved.config)
            .context("failed to serialize configuration")?,
        _ => resolved
            .show_toml()
            .context("failed to render configuration")?,
    };
    println!("{rendered}");
    Ok(())
}

/// Print the paths capgate reads from and writes to.
pub(crate) fn show_paths(resolved: &ResolvedConfig, workspace_root: Option<&std::path::Path>) {
    println!("\n{}", Theme::header("Configuration Paths"));
    println!(
        "  {}",
        Theme::kv("Home", &resolved.capgate_home.display().to_string())
    );
    println!(
        "  {}",
        Theme::kv(
            "User config",
            &resolved.capgate_home.join("config.toml").display().to_string()
        )
    );
    if let Some(root) = workspace_root {
        println!(
            "  {}",
            Theme::kv(
                "Workspace config",
                &root.join(CAPGATE_DIR).join("config.toml").display().to_string()
            )
        );
    }
    let storage = if resolved.config.storage.in_memory {
        Theme::dimmed("in memory")
    } else {
        resolved.storage_dir().display().to_string()
    };
    println!("  {}", Theme::kv("Storage", &storage));

    if resolved.loaded_files.is_empty() {
        println!("  {}", Theme::dimmed("No config files found; using defaults."));
    } else {
        println!("  {}", Theme::header("Loaded"));
        for path in &resolved.loaded_files {
            println!("    {}", Theme::success(path));
        }
    }
    println!();
}
