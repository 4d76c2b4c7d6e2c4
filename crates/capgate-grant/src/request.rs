//! Grant requests and their identifiers.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{GrantError, GrantResult};
use crate::key::{CapabilityKey, dedup_ordered};

/// Identifies one batched request to the authority.
///
/// Results carry the id back so late answers to a superseded request can be
/// told apart from the current one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub Uuid);

impl RequestId {
    /// Create a new random request ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "grant:{}", self.0)
    }
}

/// A single batched request for one or more capabilities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantRequest {
    /// Correlation id.
    pub id: RequestId,
    /// Requested keys, in caller order, without repeats.
    pub keys: Vec<CapabilityKey>,
    /// When the request was issued.
    pub issued_at: DateTime<Utc>,
}

impl GrantRequest {
    /// Build a request with a fresh id.
    ///
    /// Repeated keys are dropped, keeping the first occurrence.
    ///
    /// # Errors
    ///
    /// Returns [`GrantError::InvalidArgument`] if `keys` is empty.
    pub fn new(keys: &[CapabilityKey]) -> GrantResult<Self> {
        if keys.is_empty() {
            return Err(GrantError::InvalidArgument(
                "a grant request needs at least one capability key".into(),
            ));
        }
        Ok(Self {
            id: RequestId::new(),
            keys: dedup_ordered(keys),
            issued_at: Utc::now(),
        })
    }

    /// Whether `key` is part of this request.
    #[must_use]
    pub fn contains(&self, key: &CapabilityKey) -> bool {
        self.keys.contains(key)
    }
}

impl fmt::Display for GrantRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [", self.id)?;
        for (i, key) in self.keys.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{key}")?;
        }
        f.write_str("]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_request_is_rejected() {
        assert!(matches!(
            GrantRequest::new(&[]),
            Err(GrantError::InvalidArgument(_))
        ));
    }

    #[test]
    fn request_ids_are_fresh() {
        let keys = CapabilityKey::parse_all(["storage"]).unwrap();
        let a = GrantRequest::new(&keys).unwrap();
        let b = GrantRequest::new(&keys).unwrap();
        assert_ne!(a.id, b.id);
        assert!(a.id.to_string().starts_with("grant:"));
    }

    #[test]
    fn duplicate_keys_collapse() {
        let keys = CapabilityKey::parse_all(["a", "b", "a"]).unwrap();
        let request = GrantRequest::new(&keys).unwrap();
        assert_eq!(request.keys.len(), 2);
        assert!(request.to_string().ends_with("[a, b]"));
    }
}
