//! The next user-facing step after a grant result.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::key::CapabilityKey;

/// What the embedding application should do next.
///
/// A batch resolves either to exactly `[Proceed]` or to one non-`Proceed`
/// decision per denied key, never a mix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "decision", content = "key")]
pub enum Decision {
    /// Every requested capability is granted; start the gated functionality.
    Proceed,
    /// Explain why the capability is needed, then offer to ask again.
    ShowRationale(CapabilityKey),
    /// In-app asking is no longer possible; send the user to system settings.
    RedirectToSettings(CapabilityKey),
}

impl Decision {
    /// Whether this is [`Decision::Proceed`].
    #[must_use]
    pub fn is_proceed(&self) -> bool {
        matches!(self, Self::Proceed)
    }

    /// The capability this decision is about, if any.
    #[must_use]
    pub fn key(&self) -> Option<&CapabilityKey> {
        match self {
            Self::Proceed => None,
            Self::ShowRationale(key) | Self::RedirectToSettings(key) => Some(key),
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Proceed => f.write_str("proceed"),
            Self::ShowRationale(key) => write!(f, "show rationale for {key}"),
            Self::RedirectToSettings(key) => write!(f, "redirect to settings for {key}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_tagged() {
        let key = CapabilityKey::new("storage").unwrap();
        let json = serde_json::to_string(&Decision::ShowRationale(key)).unwrap();
        assert_eq!(json, r#"{"decision":"show_rationale","key":"storage"}"#);
        assert_eq!(
            serde_json::to_string(&Decision::Proceed).unwrap(),
            r#"{"decision":"proceed"}"#
        );
    }

    #[test]
    fn key_accessor() {
        let key = CapabilityKey::new("storage").unwrap();
        assert!(Decision::Proceed.key().is_none());
        assert_eq!(Decision::RedirectToSettings(key.clone()).key(), Some(&key));
        assert!(Decision::Proceed.is_proceed());
    }
}
