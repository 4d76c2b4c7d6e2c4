//! Capability keys.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{GrantError, GrantResult};

/// Keys for capabilities the bundled frontends know about.
pub mod well_known {
    /// Write access to shared storage, needed before the capture service can
    /// write recordings.
    pub const WRITE_EXTERNAL_STORAGE: &str = "write-external-storage";
    /// Microphone and playback capture.
    pub const RECORD_AUDIO: &str = "record-audio";
}

/// Opaque identifier for a requestable capability.
///
/// Keys double as storage keys in the consent history, so they must be
/// non-empty and must not contain NUL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CapabilityKey(String);

impl CapabilityKey {
    /// Validate and wrap a key.
    ///
    /// # Errors
    ///
    /// Returns [`GrantError::InvalidArgument`] for an empty key or one that
    /// contains a NUL byte.
    pub fn new(key: impl Into<String>) -> GrantResult<Self> {
        let key = key.into();
        if key.is_empty() {
            return Err(GrantError::InvalidArgument(
                "capability key must not be empty".into(),
            ));
        }
        if key.contains('\0') {
            return Err(GrantError::InvalidArgument(format!(
                "capability key {key:?} contains a null byte"
            )));
        }
        Ok(Self(key))
    }

    /// Parse a list of raw keys, failing on the first invalid one.
    ///
    /// # Errors
    ///
    /// Returns [`GrantError::InvalidArgument`] if any key is invalid.
    pub fn parse_all<I, S>(raw: I) -> GrantResult<Vec<Self>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        raw.into_iter().map(Self::new).collect()
    }

    /// The key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CapabilityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for CapabilityKey {
    type Err = GrantError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for CapabilityKey {
    type Error = GrantError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CapabilityKey> for String {
    fn from(key: CapabilityKey) -> Self {
        key.0
    }
}

impl AsRef<str> for CapabilityKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Remove repeated keys, keeping the first occurrence of each.
pub(crate) fn dedup_ordered(keys: &[CapabilityKey]) -> Vec<CapabilityKey> {
    let mut seen = std::collections::HashSet::with_capacity(keys.len());
    keys.iter()
        .filter(|key| seen.insert(key.as_str()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_and_nul() {
        assert!(matches!(
            CapabilityKey::new(""),
            Err(GrantError::InvalidArgument(_))
        ));
        assert!(matches!(
            CapabilityKey::new("a\0b"),
            Err(GrantError::InvalidArgument(_))
        ));
        assert_eq!(
            CapabilityKey::new(well_known::RECORD_AUDIO)
                .unwrap()
                .as_str(),
            "record-audio"
        );
    }

    #[test]
    fn parses_from_str() {
        let key: CapabilityKey = "camera".parse().unwrap();
        assert_eq!(key.to_string(), "camera");
        assert!("".parse::<CapabilityKey>().is_err());
    }

    #[test]
    fn serde_is_a_plain_string() {
        let key = CapabilityKey::new("storage").unwrap();
        assert_eq!(serde_json::to_string(&key).unwrap(), "\"storage\"");
        assert!(serde_json::from_str::<CapabilityKey>("\"\"").is_err());
    }

    #[test]
    fn dedup_keeps_first_occurrence() {
        let keys = CapabilityKey::parse_all(["b", "a", "b", "c", "a"]).unwrap();
        let deduped: Vec<String> = dedup_ordered(&keys).into_iter().map(String::from).collect();
        assert_eq!(deduped, vec!["b", "a", "c"]);
    }
}
