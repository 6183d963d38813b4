//! Collection layer.
//!
//! The sync engine does not own the entry collection; it hands externally
//! changed entries to an [`EntryStore`]. [`MemoryEntryStore`] is the in-process
//! implementation used by the server binary and the tests.
//!
//! # Concurrency Model
//!
//! - DashMap for per-entry concurrent access
//! - Event broadcasting for observers of the collection itself

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::sync::broadcast;

use folio_types::Entry;

/// The collection the engine folds external changes into.
pub trait EntryStore: Send + Sync {
    /// Insert a new entry or replace the existing one with the same title.
    fn add_or_update(&self, entry: Entry);

    /// Look up an entry by title.
    fn get(&self, title: &str) -> Option<Entry>;
}

/// Shared handle to a collection.
pub type SharedEntryStore = Arc<dyn EntryStore>;

/// Events broadcast when the in-memory collection changes.
#[derive(Clone, Debug)]
pub enum StoreEvent {
    /// An entry was inserted or replaced.
    Upserted { title: String, version: u64 },
    /// An entry was removed.
    Removed { title: String },
}

/// In-memory entry collection.
pub struct MemoryEntryStore {
    entries: DashMap<String, Entry>,
    /// Incremented on every change.
    version: AtomicU64,
    event_tx: broadcast::Sender<StoreEvent>,
}

impl MemoryEntryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(1024);
        Self {
            entries: DashMap::new(),
            version: AtomicU64::new(0),
            event_tx,
        }
    }

    /// Subscribe to collection changes.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.event_tx.subscribe()
    }

    /// Remove an entry, returning it if present.
    pub fn remove(&self, title: &str) -> Option<Entry> {
        let removed = self.entries.remove(title).map(|(_, entry)| entry);
        if removed.is_some() {
            self.version.fetch_add(1, Ordering::SeqCst);
            let _ = self.event_tx.send(StoreEvent::Removed {
                title: title.to_string(),
            });
        }
        removed
    }

    /// Titles of all entries, sorted.
    pub fn titles(&self) -> Vec<String> {
        let mut titles: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        titles.sort();
        titles
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Current version counter.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }
}

impl Default for MemoryEntryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EntryStore for MemoryEntryStore {
    fn add_or_update(&self, entry: Entry) {
        let title = entry.title.clone();
        self.entries.insert(title.clone(), entry);
        let version = self.version.fetch_add(1, Ordering::SeqCst) + 1;
        let _ = self.event_tx.send(StoreEvent::Upserted { title, version });
    }

    fn get(&self, title: &str) -> Option<Entry> {
        self.entries.get(title).map(|e| e.value().clone())
    }
}
