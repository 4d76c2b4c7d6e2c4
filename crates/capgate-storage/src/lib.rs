//! Capgate Storage: durable flags keyed by string.
//!
//! Consent history has to survive process restarts, so everything the
//! negotiation engine remembers lands here. The layer is flat:
//! a namespace, a key, and a byte value. No schema, no expiry, no eviction.
//!
//! # Backends
//!
//! - [`MemoryKvStore`] (always available): tests and ephemeral sessions
//! - `SurrealKvStore` (behind the **`kv`** feature): embedded, ACID, on disk
//!
//! # Namespaces
//!
//! | Namespace | Owner |
//! |-----------|-------|
//! | `consent:asked` | consent records (has this capability ever been requested) |
//! | `authority:grants` | the CLI's simulated platform authority |
//!
//! Callers normally hold a [`ScopedKvStore`], which pins one namespace and
//! adds JSON helpers.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod error;
pub mod kv;

pub use error::{StorageError, StorageResult};
pub use kv::{KvStore, MemoryKvStore, ScopedKvStore};

#[cfg(feature = "kv")]
pub use kv::SurrealKvStore;
