//! Layered configuration for capgate.
//!
//! # Usage
//!
//! ```rust,no_run
//! use capgate_config::Config;
//!
//! let resolved = Config::load(Some(std::path::Path::new("."))).unwrap();
//! println!("overlap policy: {}", resolved.config.negotiation.overlap);
//! ```
//!
//! # Precedence
//!
//! From highest to lowest:
//!
//! 1. **Workspace** (`{workspace}/.capgate/config.toml`)
//! 2. **User** (`~/.capgate/config.toml`, or the file passed with `--config`)
//! 3. **Environment variables** (`CAPGATE_*`), fallback only
//! 4. **Embedded defaults** (`defaults.toml`)
//!
//! This crate depends on no other capgate crate. Conversion to domain types
//! happens in the CLI.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

/// Environment variable fallbacks.
pub mod env;
/// Configuration error types.
pub mod error;
/// File discovery and layered loading.
pub mod loader;
/// TOML tree merging with source tracking.
pub mod merge;
/// Resolved configuration and its annotated display.
pub mod show;
/// Configuration struct definitions.
pub mod types;
/// Validation rules.
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::LoadOptions;
pub use merge::ConfigLayer;
pub use show::ResolvedConfig;
pub use types::*;

impl Config {
    /// Load with the full layer chain.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if a file is malformed or the result fails
    /// validation.
    pub fn load(workspace_root: Option<&std::path::Path>) -> ConfigResult<ResolvedConfig> {
        loader::load(&LoadOptions {
            workspace_root: workspace_root.map(std::path::Path::to_path_buf),
            ..LoadOptions::default()
        })
    }

    /// Load a single file with no layering.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file cannot be read, parsed, or fails
    /// validation.
    pub fn load_file(path: &std::path::Path) -> ConfigResult<Self> {
        loader::load_file(path)
    }
}
