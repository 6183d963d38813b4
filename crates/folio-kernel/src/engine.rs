//! Engine wiring.
//!
//! [`SyncEngine`] owns one of each component over a single directory:
//!
//! ```text
//!            ┌──────────────┐   save/load/delete   ┌─────────────┐
//! caller ───►│  SyncAdaptor │─────────────────────►│             │
//!            └──────┬───────┘                      │  directory  │
//!                   │ FileIndex                    │             │
//!                   │ SuppressionRegistry ◄────────┤  (notify)   │
//!            ┌──────┴────────┐   external edits    │             │
//! store ◄────│ ChangeWatcher │◄────────────────────┤             │
//!            └──────┬────────┘                     └─────────────┘
//!                   ▼
//!          NotificationChannel ──► FlowBus ──► observers
//! ```

use std::path::Path;
use std::sync::Arc;

use folio_types::Entry;

use crate::adaptor::{AdaptorInfo, SaveOutcome, SyncAdaptor};
use crate::boot::{self, BootReport};
use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::file_index::FileIndex;
use crate::flows::{SharedEntryFlowBus, shared_entry_flow_bus};
use crate::notification::NotificationChannel;
use crate::render::{Renderer, TidRenderer};
use crate::store::SharedEntryStore;
use crate::suppression::SuppressionRegistry;
use crate::watcher::{ChangeWatcher, WatcherHandle};

/// Capacity of the engine's flow bus.
const FLOW_CAPACITY: usize = 256;

/// A sync engine over one directory.
pub struct SyncEngine {
    config: SyncConfig,
    adaptor: SyncAdaptor,
    watcher: Arc<ChangeWatcher>,
    flows: SharedEntryFlowBus,
    boot: BootReport,
}

impl SyncEngine {
    /// Open `config.root` with the stock renderer and no observers.
    pub async fn open(config: SyncConfig, store: SharedEntryStore) -> SyncResult<Self> {
        Self::open_with(config, store, Arc::new(TidRenderer), None).await
    }

    /// Open `config.root`.
    ///
    /// Creates the directory if it is missing, then loads what is already
    /// there into `store`. When `notifier` is given, externally changed
    /// entries are announced on its bus, which also becomes the engine's
    /// flow bus.
    pub async fn open_with(
        mut config: SyncConfig,
        store: SharedEntryStore,
        renderer: Arc<dyn Renderer>,
        notifier: Option<NotificationChannel>,
    ) -> SyncResult<Self> {
        tokio::fs::create_dir_all(&config.root)
            .await
            .map_err(|e| SyncError::directory(&config.root, e))?;
        config.root =
            dunce::canonicalize(&config.root).map_err(|e| SyncError::directory(&config.root, e))?;

        let index = Arc::new(FileIndex::new(&config.root, Arc::new(config.types.clone())));
        let registry = Arc::new(SuppressionRegistry::new());
        let boot = boot::load_directory(&config, &index, &registry, store.as_ref()).await?;

        let flows = match &notifier {
            Some(notifier) => Arc::clone(notifier.bus()),
            None => shared_entry_flow_bus(FLOW_CAPACITY),
        };

        let adaptor = SyncAdaptor::new(&config, Arc::clone(&index), Arc::clone(&registry), renderer)
            .with_flows(Arc::clone(&flows));

        let mut watcher = ChangeWatcher::new(&config, index, registry, store);
        if let Some(notifier) = notifier {
            watcher = watcher.with_notifier(notifier);
        }

        tracing::info!(path = %config.root.display(), entries = boot.loaded.len(), "sync engine open");
        Ok(Self {
            config,
            adaptor,
            watcher: Arc::new(watcher),
            flows,
            boot,
        })
    }

    /// Canonical target directory.
    pub fn root(&self) -> &Path {
        &self.config.root
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn adaptor(&self) -> &SyncAdaptor {
        &self.adaptor
    }

    pub fn watcher(&self) -> &Arc<ChangeWatcher> {
        &self.watcher
    }

    pub fn index(&self) -> &Arc<FileIndex> {
        self.adaptor.index()
    }

    pub fn registry(&self) -> &Arc<SuppressionRegistry> {
        self.adaptor.registry()
    }

    /// Bus carrying `entry.saved`, `entry.deleted` and `entry.updated`.
    pub fn flows(&self) -> &SharedEntryFlowBus {
        &self.flows
    }

    /// What the boot scan found.
    pub fn boot_report(&self) -> &BootReport {
        &self.boot
    }

    /// Save an entry to disk.
    pub async fn save(&self, entry: &Entry) -> SyncResult<SaveOutcome> {
        self.adaptor.save(entry).await
    }

    /// Load an entry. See [`SyncAdaptor::load`].
    pub async fn load(&self, title: &str) -> SyncResult<Option<Entry>> {
        self.adaptor.load(title).await
    }

    /// Delete an entry's files.
    pub async fn delete(&self, title: &str) -> SyncResult<()> {
        self.adaptor.delete(title).await
    }

    pub fn entry_info(&self, entry: &Entry) -> AdaptorInfo {
        self.adaptor.entry_info(entry)
    }

    /// Start watching the directory for external changes.
    pub async fn start_watching(&self) -> SyncResult<WatcherHandle> {
        self.watcher.start().await
    }
}
