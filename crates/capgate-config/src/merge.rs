//! Deep merge of TOML trees with per-field source tracking.
//!
//! Merging works on raw [`toml::Value`] trees so that a key missing from an
//! upper layer never resets the value set by a lower one.

use std::collections::HashMap;
use std::fmt;

/// Which layer a value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigLayer {
    /// Embedded `defaults.toml`.
    Defaults,
    /// `~/.capgate/config.toml` or an explicit `--config` file.
    User,
    /// `{workspace}/.capgate/config.toml`.
    Workspace,
    /// A `CAPGATE_*` environment variable.
    Environment,
}

impl fmt::Display for ConfigLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Defaults => "defaults",
            Self::User => "user",
            Self::Workspace => "workspace",
            Self::Environment => "env",
        })
    }
}

/// Dotted field path to the layer that last set it.
pub type FieldSources = HashMap<String, ConfigLayer>;

/// Merge `overlay` into `base`, recording `layer` for every leaf it sets.
///
/// Tables merge per key; scalars and arrays replace.
pub fn merge_layer(
    base: &mut toml::Value,
    overlay: &toml::Value,
    layer: ConfigLayer,
    sources: &mut FieldSources,
) {
    merge_at(base, overlay, "", layer, sources);
}

/// Record `layer` for every leaf of `value`.
pub fn record_leaves(value: &toml::Value, layer: ConfigLayer, sources: &mut FieldSources) {
    record_at(value, "", layer, sources);
}

fn merge_at(
    base: &mut toml::Value,
    overlay: &toml::Value,
    prefix: &str,
    layer: ConfigLayer,
    sources: &mut FieldSources,
) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let path = join(prefix, key);
                match base_table.get_mut(key) {
                    Some(base_val) if overlay_val.is_table() => {
                        merge_at(base_val, overlay_val, &path, layer, sources);
                    },
                    Some(base_val) => {
                        *base_val = overlay_val.clone();
                        sources.insert(path, layer);
                    },
                    None => {
                        base_table.insert(key.clone(), overlay_val.clone());
                        record_at(overlay_val, &path, layer, sources);
                    },
                }
            }
        },
        (base, overlay) => {
            *base = overlay.clone();
            record_at(overlay, prefix, layer, sources);
        },
    }
}

fn record_at(value: &toml::Value, prefix: &str, layer: ConfigLayer, sources: &mut FieldSources) {
    if let toml::Value::Table(table) = value {
        for (key, child) in table {
            record_at(child, &join(prefix, key), layer, sources);
        }
    } else {
        sources.insert(prefix.to_owned(), layer);
    }
}

fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_owned()
    } else {
        format!("{prefix}.{key}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> toml::Value {
        toml::from_str(raw).unwrap()
    }

    #[test]
    fn overlay_replaces_leaves_and_keeps_siblings() {
        let mut base = parse("[logging]\nlevel = \"warn\"\nformat = \"compact\"\n");
        let mut sources = FieldSources::new();
        record_leaves(&base, ConfigLayer::Defaults, &mut sources);

        merge_layer(
            &mut base,
            &parse("[logging]\nlevel = \"debug\"\n"),
            ConfigLayer::User,
            &mut sources,
        );

        assert_eq!(base["logging"]["level"].as_str(), Some("debug"));
        assert_eq!(base["logging"]["format"].as_str(), Some("compact"));
        assert_eq!(sources["logging.level"], ConfigLayer::User);
        assert_eq!(sources["logging.format"], ConfigLayer::Defaults);
    }

    #[test]
    fn arrays_replace_rather_than_append() {
        let mut base = parse("[negotiation]\ncapabilities = [\"a\", \"b\"]\n");
        let mut sources = FieldSources::new();
        merge_layer(
            &mut base,
            &parse("[negotiation]\ncapabilities = [\"c\"]\n"),
            ConfigLayer::Workspace,
            &mut sources,
        );
        let caps = base["negotiation"]["capabilities"].as_array().unwrap();
        assert_eq!(caps.len(), 1);
        assert_eq!(sources["negotiation.capabilities"], ConfigLayer::Workspace);
    }

    #[test]
    fn new_sections_are_recorded() {
        let mut base = parse("[logging]\nlevel = \"warn\"\n");
        let mut sources = FieldSources::new();
        merge_layer(
            &mut base,
            &parse("[storage]\npath = \"/data\"\n"),
            ConfigLayer::User,
            &mut sources,
        );
        assert_eq!(base["storage"]["path"].as_str(), Some("/data"));
        assert_eq!(sources["storage.path"], ConfigLayer::User);
    }
}
