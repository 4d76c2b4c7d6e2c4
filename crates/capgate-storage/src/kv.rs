//! Key-value store trait and its backends.
//!
//! Values are opaque bytes addressed by `(namespace, key)`. Both parts must
//! be non-empty and free of NUL bytes, because the on-disk backend joins
//! them as `"{namespace}\0{key}"`.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::error::{StorageError, StorageResult};

fn check_part(kind: &str, value: &str) -> StorageResult<()> {
    if value.is_empty() {
        return Err(StorageError::InvalidKey(format!("{kind} must not be empty")));
    }
    if value.contains('\0') {
        return Err(StorageError::InvalidKey(format!(
            "{kind} must not contain null bytes"
        )));
    }
    Ok(())
}

fn validate(namespace: &str, key: &str) -> StorageResult<()> {
    check_part("namespace", namespace)?;
    check_part("key", key)
}

/// Byte-level storage scoped by namespace.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Read a value. `None` if the key was never written.
    async fn get(&self, namespace: &str, key: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Write a value, replacing any previous one.
    async fn set(&self, namespace: &str, key: &str, value: Vec<u8>) -> StorageResult<()>;

    /// Remove a key. Returns `true` if it existed.
    async fn delete(&self, namespace: &str, key: &str) -> StorageResult<bool>;

    /// Every key currently stored in `namespace`, in no particular order.
    async fn list_keys(&self, namespace: &str) -> StorageResult<Vec<String>>;
}

// ---------------------------------------------------------------------------
// In-memory backend
// ---------------------------------------------------------------------------

/// Process-local store. Forgets everything on drop.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    data: RwLock<HashMap<(String, String), Vec<u8>>>,
}

impl MemoryKvStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> StorageError {
    StorageError::Internal(e.to_string())
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, namespace: &str, key: &str) -> StorageResult<Option<Vec<u8>>> {
        validate(namespace, key)?;
        let data = self.data.read().map_err(poisoned)?;
        Ok(data.get(&(namespace.to_owned(), key.to_owned())).cloned())
    }

    async fn set(&self, namespace: &str, key: &str, value: Vec<u8>) -> StorageResult<()> {
        validate(namespace, key)?;
        let mut data = self.data.write().map_err(poisoned)?;
        data.insert((namespace.to_owned(), key.to_owned()), value);
        Ok(())
    }

    async fn delete(&self, namespace: &str, key: &str) -> StorageResult<bool> {
        validate(namespace, key)?;
        let mut data = self.data.write().map_err(poisoned)?;
        Ok(data
            .remove(&(namespace.to_owned(), key.to_owned()))
            .is_some())
    }

    async fn list_keys(&self, namespace: &str) -> StorageResult<Vec<String>> {
        check_part("namespace", namespace)?;
        let data = self.data.read().map_err(poisoned)?;
        Ok(data
            .keys()
            .filter(|(ns, _)| ns == namespace)
            .map(|(_, key)| key.clone())
            .collect())
    }
}

// ---------------------------------------------------------------------------
// SurrealKV backend
// ---------------------------------------------------------------------------

/// On-disk store backed by `SurrealKV`.
///
/// Every call runs in its own transaction, so a `set` that returns `Ok`
/// has been committed.
///
/// ```rust,ignore
/// use capgate_storage::{KvStore, SurrealKvStore};
///
/// let store = SurrealKvStore::open("./data/consent")?;
/// store.set("consent:asked", "record-audio", b"true".to_vec()).await?;
/// ```
#[cfg(feature = "kv")]
pub struct SurrealKvStore {
    tree: surrealkv::Tree,
}

#[cfg(feature = "kv")]
impl std::fmt::Debug for SurrealKvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SurrealKvStore").finish_non_exhaustive()
    }
}

#[cfg(feature = "kv")]
fn composite_key(namespace: &str, key: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(namespace.len().saturating_add(key.len()).saturating_add(1));
    buf.extend_from_slice(namespace.as_bytes());
    buf.push(0);
    buf.extend_from_slice(key.as_bytes());
    buf
}

/// `["{ns}\0", "{ns}\x01")` covers exactly the keys of one namespace.
#[cfg(feature = "kv")]
fn namespace_range(namespace: &str) -> (Vec<u8>, Vec<u8>) {
    let mut start = namespace.as_bytes().to_vec();
    let mut end = start.clone();
    start.push(0);
    end.push(1);
    (start, end)
}

#[cfg(feature = "kv")]
fn kv_err(e: &surrealkv::Error) -> StorageError {
    StorageError::Internal(e.to_string())
}

#[cfg(feature = "kv")]
impl SurrealKvStore {
    /// Open (or create) a store in the given directory.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Connection`] if the directory cannot be used.
    pub fn open(path: impl AsRef<std::path::Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        let tree = surrealkv::TreeBuilder::new()
            .with_path(path.to_path_buf())
            .build()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        tracing::debug!(path = %path.display(), "opened surrealkv store");
        Ok(Self { tree })
    }

    /// Flush and close the store.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Internal`] if the flush fails.
    pub async fn close(&self) -> StorageResult<()> {
        self.tree.close().await.map_err(|ref e| kv_err(e))
    }
}

#[cfg(feature = "kv")]
#[async_trait]
impl KvStore for SurrealKvStore {
    async fn get(&self, namespace: &str, key: &str) -> StorageResult<Option<Vec<u8>>> {
        validate(namespace, key)?;
        let tx = self
            .tree
            .begin_with_mode(surrealkv::Mode::ReadOnly)
            .map_err(|ref e| kv_err(e))?;
        tx.get(&composite_key(namespace, key))
            .map_err(|ref e| kv_err(e))
    }

    async fn set(&self, namespace: &str, key: &str, value: Vec<u8>) -> StorageResult<()> {
        validate(namespace, key)?;
        let mut tx = self.tree.begin().map_err(|ref e| kv_err(e))?;
        tx.set(&composite_key(namespace, key), &value)
            .map_err(|ref e| kv_err(e))?;
        tx.commit().await.map_err(|ref e| kv_err(e))
    }

    async fn delete(&self, namespace: &str, key: &str) -> StorageResult<bool> {
        validate(namespace, key)?;
        let ck = composite_key(namespace, key);
        let mut tx = self.tree.begin().map_err(|ref e| kv_err(e))?;
        let existed = tx.get(&ck).map_err(|ref e| kv_err(e))?.is_some();
        if existed {
            tx.delete(&ck).map_err(|ref e| kv_err(e))?;
            tx.commit().await.map_err(|ref e| kv_err(e))?;
        }
        Ok(existed)
    }

    async fn list_keys(&self, namespace: &str) -> StorageResult<Vec<String>> {
        check_part("namespace", namespace)?;
        let (start, end) = namespace_range(namespace);
        let prefix_len = namespace.len().saturating_add(1);

        let tx = self
            .tree
            .begin_with_mode(surrealkv::Mode::ReadOnly)
            .map_err(|ref e| kv_err(e))?;
        let mut iter = tx.range(&start, &end).map_err(|ref e| kv_err(e))?;
        iter.seek_first().map_err(|ref e| kv_err(e))?;

        let mut keys = Vec::new();
        while iter.valid() {
            let raw = iter.key();
            if let Some(tail) = raw.get(prefix_len..)
                && let Ok(key) = std::str::from_utf8(tail)
                && !key.is_empty()
            {
                keys.push(key.to_owned());
            }
            iter.next().map_err(|ref e| kv_err(e))?;
        }
        Ok(keys)
    }
}

// ---------------------------------------------------------------------------
// Scoped view
// ---------------------------------------------------------------------------

/// A [`KvStore`] with one namespace pinned.
///
/// Cheap to clone; all clones share the underlying store.
#[derive(Clone)]
pub struct ScopedKvStore {
    inner: Arc<dyn KvStore>,
    namespace: String,
}

impl std::fmt::Debug for ScopedKvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopedKvStore")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

impl ScopedKvStore {
    /// Pin `namespace` on `store`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidKey`] if the namespace is empty or
    /// contains null bytes.
    pub fn new(store: Arc<dyn KvStore>, namespace: impl Into<String>) -> StorageResult<Self> {
        let namespace = namespace.into();
        check_part("namespace", &namespace)?;
        Ok(Self {
            inner: store,
            namespace,
        })
    }

    /// The pinned namespace.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Read raw bytes.
    ///
    /// # Errors
    ///
    /// Propagates backend and key validation errors.
    pub async fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        self.inner.get(&self.namespace, key).await
    }

    /// Write raw bytes.
    ///
    /// # Errors
    ///
    /// Propagates backend and key validation errors.
    pub async fn set(&self, key: &str, value: Vec<u8>) -> StorageResult<()> {
        self.inner.set(&self.namespace, key, value).await
    }

    /// Remove a key. Returns `true` if it existed.
    ///
    /// # Errors
    ///
    /// Propagates backend and key validation errors.
    pub async fn delete(&self, key: &str) -> StorageResult<bool> {
        self.inner.delete(&self.namespace, key).await
    }

    /// Every key in the pinned namespace.
    ///
    /// # Errors
    ///
    /// Propagates backend errors.
    pub async fn list_keys(&self) -> StorageResult<Vec<String>> {
        self.inner.list_keys(&self.namespace).await
    }

    /// Read and decode a JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Serialization`] if the stored bytes are not
    /// valid JSON for `T`.
    pub async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        key: &str,
    ) -> StorageResult<Option<T>> {
        self.get(key)
            .await?
            .map(|bytes| {
                serde_json::from_slice(&bytes)
                    .map_err(|e| StorageError::Serialization(e.to_string()))
            })
            .transpose()
    }

    /// Encode a value as JSON and write it.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Serialization`] if encoding fails.
    pub async fn set_json<T: serde::Serialize>(&self, key: &str, value: &T) -> StorageResult<()> {
        let bytes =
            serde_json::to_vec(value).map_err(|e| StorageError::Serialization(e.to_string()))?;
        self.set(key, bytes).await
    }
}
