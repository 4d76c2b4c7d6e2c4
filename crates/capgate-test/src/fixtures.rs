//! Test fixtures for common types.

use std::sync::Arc;

use capgate_grant::{CapabilityKey, ConsentStore, GrantOutcome, GrantState, well_known};
use capgate_storage::{KvStore, MemoryKvStore};

/// Create a capability key.
///
/// # Panics
///
/// Panics if `raw` is not a valid key.
#[must_use]
pub fn test_key(raw: &str) -> CapabilityKey {
    CapabilityKey::new(raw).expect("valid test capability key")
}

/// Create several capability keys, in order.
///
/// # Panics
///
/// Panics if any entry is not a valid key.
#[must_use]
pub fn test_keys(raw: &[&str]) -> Vec<CapabilityKey> {
    raw.iter().map(|r| test_key(r)).collect()
}

/// The storage capability the capture service needs.
#[must_use]
pub fn storage_key() -> CapabilityKey {
    test_key(well_known::WRITE_EXTERNAL_STORAGE)
}

/// The audio capture capability.
#[must_use]
pub fn audio_key() -> CapabilityKey {
    test_key(well_known::RECORD_AUDIO)
}

/// One outcome per key, pairing keys and states in order.
#[must_use]
pub fn test_outcomes(keys: &[CapabilityKey], states: &[GrantState]) -> Vec<GrantOutcome> {
    keys.iter()
        .zip(states)
        .map(|(key, state)| GrantOutcome::new(key.clone(), *state))
        .collect()
}

/// An in-memory consent store plus the backend it writes to, so a test can
/// build a second store over the same data to simulate a restart.
#[must_use]
pub fn test_consent_store() -> (ConsentStore, Arc<dyn KvStore>) {
    let kv: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
    (ConsentStore::with_kv_store(Arc::clone(&kv)), kv)
}
