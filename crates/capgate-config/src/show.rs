//! Source-annotated display for `config show`.

use std::fmt::{self, Write as _};
use std::path::PathBuf;

use crate::merge::FieldSources;
use crate::types::Config;

/// A loaded configuration plus where each value came from.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// The merged configuration.
    pub config: Config,
    /// Dotted field path to the layer that set it.
    pub field_sources: FieldSources,
    /// Config files that were loaded, lowest precedence first.
    pub loaded_files: Vec<String>,
    /// The per-user state directory (`~/.capgate` unless overridden).
    pub capgate_home: PathBuf,
}

impl ResolvedConfig {
    /// Directory of the on-disk store: `storage.path`, or
    /// `{capgate_home}/consent`.
    #[must_use]
    pub fn storage_dir(&self) -> PathBuf {
        self.config
            .storage
            .path
            .as_ref()
            .map_or_else(|| self.capgate_home.join("consent"), PathBuf::from)
    }

    /// Render as TOML with a `# [layer]` comment after each value.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be serialized.
    pub fn show_toml(&self) -> Result<String, fmt::Error> {
        let body = toml::to_string_pretty(&self.config).map_err(|_| fmt::Error)?;

        let mut output = String::new();
        output.push_str("# Resolved capgate configuration\n");
        output.push_str("# Source annotations: [defaults] [user] [workspace] [env]\n");
        if !self.loaded_files.is_empty() {
            output.push_str("#\n# Loaded files:\n");
            for path in &self.loaded_files {
                writeln!(output, "#   {path}")?;
            }
        }
        output.push('\n');

        let mut section = String::new();
        for line in body.lines() {
            let trimmed = line.trim();
            if let Some(name) = trimmed.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
                section = name.to_owned();
            }
            match self.annotation(&section, trimmed) {
                Some(layer) => writeln!(output, "{line}  # [{layer}]")?,
                None => writeln!(output, "{line}")?,
            }
        }
        Ok(output)
    }

    fn annotation(&self, section: &str, line: &str) -> Option<String> {
        if line.is_empty() || line.starts_with('#') || line.starts_with('[') {
            return None;
        }
        let key = line.split('=').next()?.trim();
        let path = if section.is_empty() {
            key.to_owned()
        } else {
            format!("{section}.{key}")
        };
        self.field_sources.get(&path).map(ToString::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::ConfigLayer;

    fn resolved() -> ResolvedConfig {
        let mut field_sources = FieldSources::new();
        field_sources.insert("logging.level".to_owned(), ConfigLayer::Environment);
        field_sources.insert("negotiation.overlap".to_owned(), ConfigLayer::Defaults);
        ResolvedConfig {
            config: Config::default(),
            field_sources,
            loaded_files: vec!["/home/u/.capgate/config.toml".to_owned()],
            capgate_home: PathBuf::from("/home/u/.capgate"),
        }
    }

    #[test]
    fn toml_output_is_annotated() {
        let output = resolved().show_toml().unwrap();
        assert!(output.contains("Resolved capgate configuration"));
        assert!(output.contains("/home/u/.capgate/config.toml"));
        assert!(output.contains("level = \"warn\"  # [env]"));
        assert!(output.contains("overlap = \"supersede\"  # [defaults]"));
    }

    #[test]
    fn storage_dir_defaults_under_home() {
        let mut resolved = resolved();
        assert_eq!(
            resolved.storage_dir(),
            PathBuf::from("/home/u/.capgate/consent")
        );
        resolved.config.storage.path = Some("/data/capgate".to_owned());
        assert_eq!(resolved.storage_dir(), PathBuf::from("/data/capgate"));
    }
}
