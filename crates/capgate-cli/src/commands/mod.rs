//! CLI commands.

pub(crate) mod config;
pub(crate) mod history;
pub(crate) mod request;
pub(crate) mod settings;
pub(crate) mod status;

use std::sync::Arc;

use anyhow::{Context, Result};
use capgate_config::ResolvedConfig;
use capgate_grant::ConsentStore;
use capgate_storage::{KvStore, MemoryKvStore, SurrealKvStore};
use tracing::{debug, warn};

use crate::terminal_authority::{DialoguerPrompter, TerminalAuthority};

/// Storage-backed state shared by the negotiation commands.
pub(crate) struct AppContext {
    pub(crate) resolved: ResolvedConfig,
    pub(crate) consent: ConsentStore,
    pub(crate) authority: TerminalAuthority,
    disk: Option<Arc<SurrealKvStore>>,
}

impl AppContext {
    /// Open the configured store and load the simulated authority from it.
    pub(crate) async fn open(resolved: ResolvedConfig) -> Result<Self> {
        let mut disk = None;
        let kv: Arc<dyn KvStore> = if resolved.config.storage.in_memory {
            debug!("using in-memory storage");
            Arc::new(MemoryKvStore::new())
        } else {
            let dir = resolved.storage_dir();
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
            let store = Arc::new(
                SurrealKvStore::open(&dir)
                    .with_context(|| format!("failed to open store at {}", dir.display()))?,
            );
            disk = Some(Arc::clone(&store));
            store
        };

        let authority = TerminalAuthority::load(Arc::clone(&kv), Arc::new(DialoguerPrompter))
            .await
            .context("failed to load simulated grant state")?;

        Ok(Self {
            resolved,
            consent: ConsentStore::with_kv_store(kv),
            authority,
            disk,
        })
    }

    /// Flush the on-disk store, then hand back `result`.
    pub(crate) async fn finish<T>(self, result: Result<T>) -> Result<T> {
        if let Some(disk) = &self.disk
            && let Err(e) = disk.close().await
        {
            warn!(error = %e, "failed to close store");
        }
        result
    }
}
