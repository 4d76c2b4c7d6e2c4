//! Configuration types.
//!
//! Self-contained: no other capgate crate is referenced here. Values that map
//! onto domain types (overlap policy, log format) stay strings and are
//! converted at the CLI boundary. Every section implements [`Default`] so a
//! bare `[section]` header yields a working configuration.

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where consent history and simulated grants are stored.
    pub storage: StorageSection,
    /// How capabilities are negotiated.
    pub negotiation: NegotiationSection,
    /// Logging level, format, and per-crate directives.
    pub logging: LoggingSection,
}

/// Persistence settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    /// Directory for the on-disk store. `None` uses `~/.capgate/consent`.
    pub path: Option<String>,
    /// Keep everything in memory; nothing survives the process.
    pub in_memory: bool,
}

/// Negotiation settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NegotiationSection {
    /// `"supersede"` (a new request replaces an outstanding one) or
    /// `"reject"` (a new request fails while one is outstanding).
    pub overlap: String,
    /// Capabilities requested when none are named on the command line.
    pub capabilities: Vec<String>,
    /// Text shown when a denial should be explained before asking again.
    pub rationale: String,
    /// Text shown when the user has to go to settings.
    pub settings_hint: String,
}

impl Default for NegotiationSection {
    fn default() -> Self {
        Self {
            overlap: "supersede".to_owned(),
            capabilities: vec!["write-external-storage".to_owned()],
            rationale: "Without this permission the app is unable to record system sound."
                .to_owned(),
            settings_hint: "Now you must allow this capability from settings.".to_owned(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Global level filter (`"trace"` .. `"error"`).
    pub level: String,
    /// `"pretty"`, `"compact"`, `"json"` or `"full"`.
    pub format: String,
    /// Per-crate directives (e.g. `["capgate_grant=debug"]`).
    pub directives: Vec<String>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "warn".to_owned(),
            format: "compact".to_owned(),
            directives: Vec::new(),
        }
    }
}
