//! Persistent "has this capability ever been requested" history.
//!
//! One record per capability key, written the first time a request for that
//! key is issued and never removed. An unseen key reads as not-yet-asked.

use std::path::Path;
use std::sync::Arc;

use capgate_storage::{KvStore, MemoryKvStore, ScopedKvStore, SurrealKvStore};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::GrantResult;
use crate::key::CapabilityKey;

/// Storage namespace for consent records.
pub const NS_CONSENT: &str = "consent:asked";

/// Consent history for one capability key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentRecord {
    /// The capability.
    pub key: CapabilityKey,
    /// Whether a request for this key has ever been issued.
    pub ever_asked: bool,
    /// When it was first requested.
    #[serde(default)]
    pub first_asked_at: Option<DateTime<Utc>>,
}

/// Durable consent history.
#[derive(Debug, Clone)]
pub struct ConsentStore {
    records: ScopedKvStore,
}

impl ConsentStore {
    /// A store that forgets everything when dropped.
    #[must_use]
    pub fn in_memory() -> Self {
        let kv: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
        Self::scoped(kv)
    }

    /// Open an on-disk store in `path`.
    ///
    /// # Errors
    ///
    /// Returns [`GrantError::Storage`](crate::GrantError::Storage) if the
    /// directory cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> GrantResult<Self> {
        let kv: Arc<dyn KvStore> = Arc::new(SurrealKvStore::open(path)?);
        Ok(Self::scoped(kv))
    }

    /// Share an existing key-value store.
    #[must_use]
    pub fn with_kv_store(store: Arc<dyn KvStore>) -> Self {
        Self::scoped(store)
    }

    fn scoped(store: Arc<dyn KvStore>) -> Self {
        // NS_CONSENT is a non-empty constant without NUL bytes.
        let records = ScopedKvStore::new(store, NS_CONSENT).expect("valid consent namespace");
        Self { records }
    }

    /// Record that `key` has been requested. Idempotent; the first-asked
    /// timestamp is kept from the first call.
    ///
    /// # Errors
    ///
    /// Returns [`GrantError::Storage`](crate::GrantError::Storage) if the
    /// record cannot be persisted.
    pub async fn mark_asked(&self, key: &CapabilityKey) -> GrantResult<()> {
        if let Some(existing) = self.record(key).await?
            && existing.ever_asked
        {
            return Ok(());
        }
        let record = ConsentRecord {
            key: key.clone(),
            ever_asked: true,
            first_asked_at: Some(Utc::now()),
        };
        self.records.set_json(key.as_str(), &record).await?;
        tracing::debug!(key = %key, "recorded first request for capability");
        Ok(())
    }

    /// Whether `key` has ever been requested. `false` for unseen keys.
    ///
    /// # Errors
    ///
    /// Returns [`GrantError::Storage`](crate::GrantError::Storage) if the
    /// record cannot be read.
    pub async fn ever_asked(&self, key: &CapabilityKey) -> GrantResult<bool> {
        Ok(self
            .record(key)
            .await?
            .is_some_and(|record| record.ever_asked))
    }

    /// The stored record for `key`, if one exists.
    ///
    /// # Errors
    ///
    /// Returns [`GrantError::Storage`](crate::GrantError::Storage) if the
    /// record cannot be read or decoded.
    pub async fn record(&self, key: &CapabilityKey) -> GrantResult<Option<ConsentRecord>> {
        Ok(self.records.get_json(key.as_str()).await?)
    }

    /// Every stored record, sorted by key.
    ///
    /// # Errors
    ///
    /// Returns [`GrantError::Storage`](crate::GrantError::Storage) if the
    /// records cannot be listed or decoded.
    pub async fn records(&self) -> GrantResult<Vec<ConsentRecord>> {
        let mut out = Vec::new();
        for raw in self.records.list_keys().await? {
            if let Some(record) = self.records.get_json::<ConsentRecord>(&raw).await? {
                out.push(record);
            }
        }
        out.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(out)
    }
}
