//! Environment variable fallbacks.
//!
//! `CAPGATE_*` variables are a fallback, not an override: they only apply to
//! fields that no config file set.

use std::collections::HashMap;
use std::hash::BuildHasher;

use tracing::debug;

use crate::merge::{ConfigLayer, FieldSources};

/// Environment variable name and the dotted field it feeds.
struct EnvMapping {
    var_name: &'static str,
    field_path: &'static str,
}

const ENV_MAPPINGS: &[EnvMapping] = &[
    EnvMapping {
        var_name: "CAPGATE_LOG_LEVEL",
        field_path: "logging.level",
    },
    EnvMapping {
        var_name: "CAPGATE_LOG_FORMAT",
        field_path: "logging.format",
    },
    EnvMapping {
        var_name: "CAPGATE_STORAGE_PATH",
        field_path: "storage.path",
    },
    EnvMapping {
        var_name: "CAPGATE_IN_MEMORY",
        field_path: "storage.in_memory",
    },
    EnvMapping {
        var_name: "CAPGATE_OVERLAP",
        field_path: "negotiation.overlap",
    },
];

/// Apply env fallbacks to every mapped field still at its default.
///
/// Returns the number of variables applied.
pub fn apply_env_fallbacks<S: BuildHasher>(
    merged: &mut toml::Value,
    sources: &mut FieldSources,
    env_vars: &HashMap<String, String, S>,
) -> usize {
    let mut count: usize = 0;

    for mapping in ENV_MAPPINGS {
        let set_by_file = sources
            .get(mapping.field_path)
            .is_some_and(|layer| *layer != ConfigLayer::Defaults);
        if set_by_file {
            continue;
        }
        let Some(raw) = env_vars.get(mapping.var_name) else {
            continue;
        };

        debug!(
            var = mapping.var_name,
            field = mapping.field_path,
            "applying env var fallback"
        );
        if set_field(merged, mapping.field_path, coerce(mapping.field_path, raw)) {
            sources.insert(mapping.field_path.to_owned(), ConfigLayer::Environment);
            count = count.saturating_add(1);
        }
    }

    count
}

/// Collect the process environment.
#[must_use]
pub fn collect_env_vars() -> HashMap<String, String> {
    std::env::vars().collect()
}

/// Insert `value` at a `section.field` path, creating the section if needed.
fn set_field(root: &mut toml::Value, path: &str, value: toml::Value) -> bool {
    let Some((section, field)) = path.split_once('.') else {
        return false;
    };
    let Some(root) = root.as_table_mut() else {
        return false;
    };
    let section = root
        .entry(section.to_owned())
        .or_insert_with(|| toml::Value::Table(toml::map::Map::new()));
    match section.as_table_mut() {
        Some(table) => {
            table.insert(field.to_owned(), value);
            true
        },
        None => false,
    }
}

fn coerce(path: &str, raw: &str) -> toml::Value {
    if path == "storage.in_memory"
        && let Ok(b) = raw.parse::<bool>()
    {
        return toml::Value::Boolean(b);
    }
    toml::Value::String(raw.to_owned())
}
