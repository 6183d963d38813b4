//! Self-write suppression.
//!
//! The adaptor and the watcher share the target directory. Without
//! coordination the watcher would see every save as an external edit and
//! fold it back into the collection. The registry tracks, per absolute path:
//!
//! - the title being written right now, if any (set before the first write,
//!   cleared after the last one);
//! - a monotonic write sequence number, so a slow save cannot clear the mark
//!   of a newer one;
//! - the blake3 fingerprint of the last bytes the engine wrote or applied.
//!
//! The watcher discards an event while a write is in flight, and also when
//! the file's current bytes match the recorded fingerprint. The second check
//! catches watch events that arrive after the in-flight mark was cleared.
//! Bytes read while a save started and finished are stale; the watcher
//! samples the sequence before reading so [`SuppressionRegistry::observe`]
//! can drop them without disturbing the save's fingerprint.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

/// Content fingerprint.
pub type Fingerprint = blake3::Hash;

/// Proof that a write to a path was begun. Pass it back to finish the write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteToken {
    path: PathBuf,
    seq: u64,
}

impl WriteToken {
    /// Path being written.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sequence number of this write.
    pub fn seq(&self) -> u64 {
        self.seq
    }
}

/// What the watcher should make of a file's current content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    /// The engine is writing this path for the named entry.
    InFlight(String),
    /// The content matches what the engine last wrote or applied.
    Unchanged,
    /// A write began after the caller sampled the sequence; the bytes read
    /// may predate it.
    Superseded,
    /// New content; recorded as the latest known state.
    Changed,
}

#[derive(Debug, Default)]
struct PathState {
    seq: u64,
    writer: Option<String>,
    fingerprint: Option<Fingerprint>,
}

/// Advisory registry of in-flight and completed self-writes.
#[derive(Debug, Default)]
pub struct SuppressionRegistry {
    paths: DashMap<PathBuf, PathState>,
    next_seq: AtomicU64,
}

impl SuppressionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `path` as being written for `title`. Call before the first write.
    pub fn begin(&self, path: &Path, title: &str) -> WriteToken {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let mut state = self.paths.entry(path.to_path_buf()).or_default();
        state.seq = seq;
        state.writer = Some(title.to_string());
        WriteToken {
            path: path.to_path_buf(),
            seq,
        }
    }

    /// Record the bytes written under `token`.
    ///
    /// Ignored if a newer write to the same path has begun since.
    pub fn record_written(&self, token: &WriteToken, bytes: &[u8]) {
        if let Some(mut state) = self.paths.get_mut(&token.path)
            && state.seq == token.seq
        {
            state.fingerprint = Some(blake3::hash(bytes));
        }
    }

    /// Clear the in-flight mark set by `token`. Call after the last write.
    ///
    /// Returns false, leaving the mark alone, if a newer write owns the path.
    pub fn finish(&self, token: WriteToken) -> bool {
        match self.paths.get_mut(&token.path) {
            Some(mut state) if state.seq == token.seq => {
                state.writer = None;
                true
            }
            _ => false,
        }
    }

    /// Clear the in-flight mark for `path` regardless of sequence.
    ///
    /// A failed save leaves its mark set; this is how callers reconcile.
    pub fn release(&self, path: &Path) {
        if let Some(mut state) = self.paths.get_mut(path) {
            state.writer = None;
        }
    }

    /// Title being written to `path`, if a write is in flight.
    pub fn in_flight(&self, path: &Path) -> Option<String> {
        self.paths.get(path).and_then(|state| state.writer.clone())
    }

    /// Compare `bytes` against the last known content of `path`.
    ///
    /// `seen_seq` is [`last_seq`](Self::last_seq) sampled before `bytes` were
    /// read. If a write has begun since, the bytes are stale and nothing is
    /// recorded. Otherwise the new fingerprint is recorded when the content
    /// differs.
    pub fn observe(&self, path: &Path, bytes: &[u8], seen_seq: u64) -> Observation {
        let fingerprint = blake3::hash(bytes);
        let mut state = self.paths.entry(path.to_path_buf()).or_default();
        if let Some(title) = &state.writer {
            return Observation::InFlight(title.clone());
        }
        if state.seq != seen_seq {
            return Observation::Superseded;
        }
        if state.fingerprint == Some(fingerprint) {
            return Observation::Unchanged;
        }
        state.fingerprint = Some(fingerprint);
        Observation::Changed
    }

    /// Record `bytes` as the known content of `path` without a write.
    ///
    /// Used for files found on disk at startup.
    pub fn seed(&self, path: &Path, bytes: &[u8]) {
        let mut state = self.paths.entry(path.to_path_buf()).or_default();
        state.fingerprint = Some(blake3::hash(bytes));
    }

    /// Drop everything known about `path`.
    pub fn forget(&self, path: &Path) {
        self.paths.remove(path);
    }

    /// Sequence number of the latest write begun on `path`; 0 if none.
    pub fn last_seq(&self, path: &Path) -> u64 {
        self.paths.get(path).map_or(0, |state| state.seq)
    }
}
