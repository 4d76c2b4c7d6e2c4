//! Grant states and per-key outcomes.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::key::CapabilityKey;

/// What the authority currently says about a capability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantState {
    /// The capability may be used.
    Granted,
    /// The capability was refused.
    Denied,
    /// Nothing is known yet, or the authority could not produce an answer.
    #[default]
    Unknown,
}

impl GrantState {
    /// Whether this state allows the capability to be used.
    #[must_use]
    pub fn is_granted(self) -> bool {
        matches!(self, Self::Granted)
    }
}

impl fmt::Display for GrantState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Granted => f.write_str("granted"),
            Self::Denied => f.write_str("denied"),
            Self::Unknown => f.write_str("unknown"),
        }
    }
}

/// The authority's answer for one key of a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantOutcome {
    /// The capability this outcome is about.
    pub key: CapabilityKey,
    /// The resulting state.
    pub state: GrantState,
}

impl GrantOutcome {
    /// Create an outcome.
    #[must_use]
    pub fn new(key: CapabilityKey, state: GrantState) -> Self {
        Self { key, state }
    }

    /// Shorthand for a granted outcome.
    #[must_use]
    pub fn granted(key: CapabilityKey) -> Self {
        Self::new(key, GrantState::Granted)
    }

    /// Shorthand for a denied outcome.
    #[must_use]
    pub fn denied(key: CapabilityKey) -> Self {
        Self::new(key, GrantState::Denied)
    }
}

/// Result of checking a set of keys against the authority's current state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    /// `true` when `missing` is empty.
    pub all_granted: bool,
    /// Keys not currently granted, in input order, without repeats.
    pub missing: Vec<CapabilityKey>,
}
