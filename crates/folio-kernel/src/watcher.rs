//! External-change watcher.
//!
//! Subscribes to filesystem events on the target directory and folds
//! genuine external edits back into the collection.
//!
//! # Lifecycle
//!
//! ```text
//!  new() ──► Scanning ──(initial scan done)──► Ready
//!            every event                       events filtered and applied
//!            discarded
//! ```
//!
//! The transition happens once, inside [`ChangeWatcher::start`], after the
//! directory has been enumerated and the fingerprints of the files found
//! there recorded. There is no way back to Scanning.
//!
//! # Filters
//!
//! In Ready state each event runs through, in order: hidden file, draft base
//! name, extension, in-flight self-write. Survivors are read from disk and
//! compared with the last known content; unchanged content is an echo and is
//! dropped. Only then is the file parsed and handed to the collection.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use regex::Regex;
use tokio::sync::{mpsc, oneshot, watch};

use folio_types::{FileRecord, TypeRegistry};

use crate::codec;
use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::file_index::{FileIndex, list_file_names};
use crate::notification::NotificationChannel;
use crate::store::SharedEntryStore;
use crate::suppression::{Observation, SuppressionRegistry};

/// Capacity of the queue between the OS watcher and the processing task.
const EVENT_QUEUE: usize = 256;

/// Watcher lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    /// Initial enumeration in progress; events are discarded.
    Scanning,
    /// Steady state.
    Ready,
}

/// Kind of a filesystem change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
    Deleted,
}

/// One filesystem change on a path in the watched directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub kind: ChangeKind,
    pub path: PathBuf,
}

impl WatchEvent {
    pub fn new(kind: ChangeKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }
}

/// Why an event was dropped before its file was read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    Scanning,
    Hidden,
    Draft,
    Extension,
    /// The file no longer exists.
    Missing,
}

/// What handling an event did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    /// Filtered out by name or state.
    Ignored(IgnoreReason),
    /// The engine's own write, in flight or already applied.
    Suppressed,
    /// The file was loaded into the collection under this title.
    Applied(String),
}

/// Watches the target directory for external changes.
pub struct ChangeWatcher {
    root: PathBuf,
    managed_extension: String,
    draft_pattern: Regex,
    poll_interval: std::time::Duration,
    types: Arc<TypeRegistry>,
    index: Arc<FileIndex>,
    registry: Arc<SuppressionRegistry>,
    store: SharedEntryStore,
    notifier: Option<NotificationChannel>,
    state: watch::Sender<WatchState>,
    event_tx: mpsc::Sender<WatchEvent>,
    event_rx: Mutex<Option<mpsc::Receiver<WatchEvent>>>,
}

impl ChangeWatcher {
    /// Create a watcher in Scanning state over the index's root directory.
    pub fn new(
        config: &SyncConfig,
        index: Arc<FileIndex>,
        registry: Arc<SuppressionRegistry>,
        store: SharedEntryStore,
    ) -> Self {
        let (event_tx, event_rx) = mpsc::channel(EVENT_QUEUE);
        let (state, _) = watch::channel(WatchState::Scanning);
        Self {
            root: index.root().to_path_buf(),
            managed_extension: config.managed_extension.clone(),
            draft_pattern: config.draft_pattern.clone(),
            poll_interval: config.poll_interval,
            types: Arc::clone(index.types()),
            index,
            registry,
            store,
            notifier: None,
            state,
            event_tx,
            event_rx: Mutex::new(Some(event_rx)),
        }
    }

    /// Notify observers of every applied change.
    pub fn with_notifier(mut self, notifier: NotificationChannel) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Current state.
    pub fn state(&self) -> WatchState {
        *self.state.borrow()
    }

    /// Receiver that observes state changes.
    pub fn state_changes(&self) -> watch::Receiver<WatchState> {
        self.state.subscribe()
    }

    /// Sender feeding the processing task. Events sent here are handled
    /// exactly like events from the OS watcher.
    pub fn event_sender(&self) -> mpsc::Sender<WatchEvent> {
        self.event_tx.clone()
    }

    /// Leave Scanning state. Idempotent.
    pub fn mark_ready(&self) {
        if self.state.send_replace(WatchState::Ready) == WatchState::Scanning {
            tracing::info!(path = %self.root.display(), "initial scan complete");
        }
    }

    /// Record the fingerprints of the managed files currently on disk.
    ///
    /// Returns how many files were seen.
    pub async fn initial_scan(&self) -> SyncResult<usize> {
        let mut seen = 0;
        for name in list_file_names(&self.root).await? {
            let path = self.root.join(&name);
            if self.filter_name(&path).is_some() {
                continue;
            }
            match tokio::fs::read(&path).await {
                Ok(bytes) => {
                    self.registry.seed(&path, &bytes);
                    seen += 1;
                }
                Err(e) => {
                    tracing::debug!(path = %path.display(), error = %e, "skipped during scan");
                }
            }
        }
        Ok(seen)
    }

    /// Name and state filters, cheapest first. `None` means the event passes.
    fn filter_name(&self, path: &Path) -> Option<IgnoreReason> {
        let Some(name) = path.file_name().map(|n| n.to_string_lossy()) else {
            return Some(IgnoreReason::Extension);
        };
        if name.starts_with('.') {
            return Some(IgnoreReason::Hidden);
        }
        let stem = path.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default();
        if self.draft_pattern.is_match(&stem) {
            return Some(IgnoreReason::Draft);
        }
        if !name.ends_with(&self.managed_extension) || name.len() == self.managed_extension.len() {
            return Some(IgnoreReason::Extension);
        }
        None
    }

    /// Handle one event.
    ///
    /// Unparseable files come back as [`SyncError::UnreadableEntry`] with
    /// nothing added to the collection.
    #[tracing::instrument(name = "watcher.event", skip_all, fields(path = %event.path.display(), kind = ?event.kind))]
    pub async fn handle_event(&self, event: &WatchEvent) -> SyncResult<EventOutcome> {
        if self.state() == WatchState::Scanning {
            return Ok(EventOutcome::Ignored(IgnoreReason::Scanning));
        }
        let path = self.normalize(&event.path);
        if let Some(reason) = self.filter_name(&path) {
            return Ok(EventOutcome::Ignored(reason));
        }
        // Sampled before the read: a save that starts while we read makes
        // the bytes stale.
        let seen_seq = self.registry.last_seq(&path);
        if let Some(writer) = self.registry.in_flight(&path) {
            tracing::trace!(path = %path.display(), title = %writer, "in-flight self-write");
            return Ok(EventOutcome::Suppressed);
        }

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(EventOutcome::Ignored(IgnoreReason::Missing));
            }
            Err(e) => return Err(SyncError::directory(&path, e)),
        };

        self.apply_read(&path, bytes, seen_seq)
    }

    /// Fold bytes read from `path` into the collection, unless they are an
    /// echo of the engine's own write or were overtaken by one.
    fn apply_read(&self, path: &Path, bytes: Vec<u8>, seen_seq: u64) -> SyncResult<EventOutcome> {
        match self.registry.observe(path, &bytes, seen_seq) {
            Observation::InFlight(_) | Observation::Unchanged | Observation::Superseded => {
                return Ok(EventOutcome::Suppressed);
            }
            Observation::Changed => {}
        }

        let text = String::from_utf8(bytes)
            .map_err(|e| SyncError::unreadable(path, e.to_string()))?;
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let entry =
            codec::parse_tid(&text, &stem).map_err(|reason| SyncError::unreadable(path, reason))?;
        let title = entry.title.clone();

        if self.index.get(&title).is_none() {
            let resolved = self.types.resolve(entry.content_type());
            self.index
                .register(&title, FileRecord::new(path, resolved.file_type, false));
        }

        self.store.add_or_update(entry);
        tracing::info!(path = %path.display(), title = %title, "Loaded external change");

        if let Some(notifier) = &self.notifier {
            notifier.notify(&title, path);
        }
        Ok(EventOutcome::Applied(title))
    }

    /// Re-anchor an event path on the root, so registry keys match the
    /// paths the adaptor writes regardless of how the backend spells them.
    fn normalize(&self, path: &Path) -> PathBuf {
        match path.file_name() {
            Some(name) if path.parent().is_some() => self.root.join(name),
            _ => path.to_path_buf(),
        }
    }

    /// Start watching.
    ///
    /// Subscribes to the OS watcher, runs the initial scan, switches to Ready
    /// and spawns the processing task. Fails if already started.
    pub async fn start(self: &Arc<Self>) -> SyncResult<WatcherHandle> {
        let mut rx = self
            .event_rx
            .lock()
            .take()
            .ok_or_else(|| SyncError::Watch("watcher already started".to_string()))?;

        let tx = self.event_tx.clone();
        let state = self.state.subscribe();
        let mut watcher = RecommendedWatcher::new(
            move |result: Result<Event, notify::Error>| {
                let Ok(event) = result else { return };
                if *state.borrow() == WatchState::Scanning {
                    return;
                }
                let kind = match event.kind {
                    EventKind::Create(_) => ChangeKind::Created,
                    EventKind::Modify(_) => ChangeKind::Modified,
                    EventKind::Remove(_) => ChangeKind::Deleted,
                    _ => return,
                };
                for path in event.paths {
                    let _ = tx.try_send(WatchEvent { kind, path });
                }
            },
            notify::Config::default().with_poll_interval(self.poll_interval),
        )
        .map_err(|e| SyncError::Watch(e.to_string()))?;

        watcher
            .watch(&self.root, RecursiveMode::NonRecursive)
            .map_err(|e| SyncError::Watch(e.to_string()))?;

        let seen = self.initial_scan().await?;
        // Anything queued while scanning predates Ready.
        let mut dropped = 0usize;
        while rx.try_recv().is_ok() {
            dropped += 1;
        }
        tracing::debug!(files = seen, dropped, "seeded fingerprints");
        self.mark_ready();

        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
        let this = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => {
                        tracing::info!("change watcher shutting down");
                        break;
                    }
                    Some(event) = rx.recv() => {
                        match this.handle_event(&event).await {
                            Ok(outcome) => {
                                tracing::trace!(path = %event.path.display(), ?outcome, "watch event");
                            }
                            Err(e) => {
                                tracing::warn!(
                                    path = %event.path.display(),
                                    error = %e,
                                    "failed to apply external change"
                                );
                            }
                        }
                    }
                }
            }
        });

        tracing::info!(path = %self.root.display(), "change watcher started");
        Ok(WatcherHandle {
            _watcher: watcher,
            shutdown_tx,
        })
    }
}

/// Handle to a running watcher.
pub struct WatcherHandle {
    /// The OS watcher (keep alive to continue watching).
    _watcher: RecommendedWatcher,
    /// Sender to signal shutdown.
    shutdown_tx: oneshot::Sender<()>,
}

impl WatcherHandle {
    /// Stop the watcher.
    pub fn stop(self) {
        let _ = self.shutdown_tx.send(());
    }
}
