//! SyncAdaptor: save / load / delete entries against the target directory.
//!
//! The collection layer calls the adaptor whenever an entry changes in
//! memory. Each save marks its primary path in the [`SuppressionRegistry`]
//! before the first write and clears the mark after the last one, so the
//! watcher does not mistake the write for an external edit.
//!
//! # Storage strategies
//!
//! ```text
//! has sidecar or base64 body          everything else
//! ┌──────────────┐ ┌───────────────┐  ┌──────────────────────────┐
//! │ photo.jpg    │ │ photo.jpg.meta│  │ HelloThere.tid           │
//! │ (raw bytes)  │ │ title: ...    │  │ title: ...  (header)     │
//! └──────────────┘ └───────────────┘  │ <blank> body             │
//!   written first    written second   └──────────────────────────┘
//! ```
//!
//! Failures abort the call and are returned as-is. Nothing is rolled back:
//! a body written before a failed sidecar write stays on disk, and the
//! in-flight mark stays set until [`SuppressionRegistry::release`] or the
//! next successful save of the same path.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use base64::Engine as _;
use serde::{Deserialize, Serialize};

use folio_types::{Encoding, Entry, FileRecord, METADATA_TEMPLATE, TypeRegistry};

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::file_index::FileIndex;
use crate::flows::{EntryFlow, SharedEntryFlowBus};
use crate::render::Renderer;
use crate::suppression::SuppressionRegistry;

/// Adaptor-specific information attached to an entry. The filesystem
/// adaptor keeps none.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdaptorInfo {}

/// Result of a successful save.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SaveOutcome {
    /// Adaptor info for the saved entry.
    pub info: AdaptorInfo,
    /// Revision of this save. Increases with every save through this adaptor.
    pub revision: u64,
    /// Where the entry was written.
    pub record: FileRecord,
}

/// Content to put on disk for one save.
enum Payload {
    /// Raw body plus rendered sidecar.
    Split { body: Vec<u8>, meta: String },
    /// One self-contained rendered file.
    Single(String),
}

/// Orchestrates disk writes for the collection layer.
pub struct SyncAdaptor {
    index: Arc<FileIndex>,
    registry: Arc<SuppressionRegistry>,
    renderer: Arc<dyn Renderer>,
    types: Arc<TypeRegistry>,
    meta_suffix: String,
    flows: Option<SharedEntryFlowBus>,
    revision: AtomicU64,
}

impl SyncAdaptor {
    /// Create an adaptor over an index and a suppression registry.
    pub fn new(
        config: &SyncConfig,
        index: Arc<FileIndex>,
        registry: Arc<SuppressionRegistry>,
        renderer: Arc<dyn Renderer>,
    ) -> Self {
        Self {
            types: Arc::clone(index.types()),
            index,
            registry,
            renderer,
            meta_suffix: config.meta_suffix.clone(),
            flows: None,
            revision: AtomicU64::new(0),
        }
    }

    /// Publish `entry.saved` / `entry.deleted` on `bus`.
    pub fn with_flows(mut self, bus: SharedEntryFlowBus) -> Self {
        self.flows = Some(bus);
        self
    }

    /// The file index.
    pub fn index(&self) -> &Arc<FileIndex> {
        &self.index
    }

    /// The suppression registry.
    pub fn registry(&self) -> &Arc<SuppressionRegistry> {
        &self.registry
    }

    /// Adaptor info for an entry.
    pub fn entry_info(&self, _entry: &Entry) -> AdaptorInfo {
        AdaptorInfo::default()
    }

    /// Write `entry` to its file (and sidecar, if its type needs one).
    #[tracing::instrument(name = "adaptor.save", skip_all, fields(title = %entry.title))]
    pub async fn save(&self, entry: &Entry) -> SyncResult<SaveOutcome> {
        if entry.title.is_empty() {
            return Err(SyncError::Untitled);
        }
        let record = self.index.resolve(entry).await?;
        let payload = self.payload(entry, &record)?;

        let token = self.registry.begin(&record.path, &entry.title);
        match &payload {
            Payload::Split { body, meta } => {
                write_file(&record.path, body).await?;
                self.registry.record_written(&token, body);
                write_file(&record.meta_path(&self.meta_suffix), meta.as_bytes()).await?;
            }
            Payload::Single(content) => {
                write_file(&record.path, content.as_bytes()).await?;
                self.registry.record_written(&token, content.as_bytes());
            }
        }
        self.registry.finish(token);

        let revision = self.revision.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::info!(path = %record.path.display(), title = %entry.title, "Saved file");

        if let Some(bus) = &self.flows {
            bus.publish(EntryFlow::Saved {
                title: entry.title.clone(),
                path: record.path.clone(),
                revision,
            });
        }

        Ok(SaveOutcome {
            info: self.entry_info(entry),
            revision,
            record,
        })
    }

    /// Load an entry by title.
    ///
    /// Always `None`: every file was handed to the collection when the
    /// directory was first scanned, so the adaptor is never the load path.
    pub async fn load(&self, title: &str) -> SyncResult<Option<Entry>> {
        tracing::trace!(title = %title, "load is served by the boot scan");
        Ok(None)
    }

    /// Delete the files of `title`.
    ///
    /// Titles that were never saved succeed without touching the disk. The
    /// primary file goes first; if that fails the sidecar is left alone.
    #[tracing::instrument(name = "adaptor.delete", skip(self))]
    pub async fn delete(&self, title: &str) -> SyncResult<()> {
        let Some(record) = self.index.get(title) else {
            tracing::debug!(title = %title, "nothing to delete");
            return Ok(());
        };

        remove_file(&record.path).await?;
        self.registry.forget(&record.path);
        tracing::info!(path = %record.path.display(), title = %title, "Deleted file");

        if record.has_meta_file {
            remove_file(&record.meta_path(&self.meta_suffix)).await?;
        }

        if let Some(bus) = &self.flows {
            bus.publish(EntryFlow::Deleted {
                title: title.to_string(),
                path: record.path,
            });
        }
        Ok(())
    }

    /// Current revision counter.
    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::SeqCst)
    }

    fn payload(&self, entry: &Entry, record: &FileRecord) -> SyncResult<Payload> {
        let content_type = entry.content_type().unwrap_or(self.types.default_type());
        let encoding = self.types.encoding(content_type);
        if record.has_meta_file || encoding == Encoding::Base64 {
            let body = decode_body(entry, encoding)?;
            let meta = self.renderer.render(entry, METADATA_TEMPLATE)?;
            return Ok(Payload::Split { body, meta });
        }

        let template = self.types.template(&record.file_type).ok_or_else(|| {
            SyncError::Render(format!("no template for file type {}", record.file_type))
        })?;
        Ok(Payload::Single(self.renderer.render(entry, template)?))
    }
}

fn decode_body(entry: &Entry, encoding: Encoding) -> SyncResult<Vec<u8>> {
    match encoding {
        Encoding::Utf8 => Ok(entry.text.as_bytes().to_vec()),
        Encoding::Base64 => {
            let compact: String = entry.text.split_whitespace().collect();
            base64::engine::general_purpose::STANDARD
                .decode(compact)
                .map_err(|e| SyncError::Encoding {
                    title: entry.title.clone(),
                    reason: e.to_string(),
                })
        }
    }
}

async fn write_file(path: &Path, bytes: &[u8]) -> SyncResult<()> {
    tokio::fs::write(path, bytes)
        .await
        .map_err(|e| SyncError::write(path, e))
}

async fn remove_file(path: &Path) -> SyncResult<()> {
    tokio::fs::remove_file(path)
        .await
        .map_err(|e| SyncError::delete(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flows::shared_entry_flow_bus;
    use crate::render::TidRenderer;
    use crate::suppression::Observation;
    use tempfile::TempDir;

    fn adaptor(dir: &TempDir) -> SyncAdaptor {
        let config = SyncConfig::new(dir.path());
        let index = Arc::new(FileIndex::new(dir.path(), Arc::new(config.types.clone())));
        SyncAdaptor::new(
            &config,
            index,
            Arc::new(SuppressionRegistry::new()),
            Arc::new(TidRenderer),
        )
    }

    #[tokio::test]
    async fn test_save_tid() {
        let dir = TempDir::new().unwrap();
        let adaptor = adaptor(&dir);
        let entry = Entry::new("Hello There").with_field("tags", "x").with_text("Hi");

        let outcome = adaptor.save(&entry).await.unwrap();
        assert_eq!(outcome.record.path, dir.path().join("Hello_There.tid"));
        assert_eq!(outcome.info, AdaptorInfo::default());

        let content = std::fs::read_to_string(&outcome.record.path).unwrap();
        assert_eq!(content, "title: Hello There\ntags: x\n\nHi");
        assert_eq!(adaptor.registry().in_flight(&outcome.record.path), None);
    }

    #[tokio::test]
    async fn test_save_binary_with_sidecar() {
        let dir = TempDir::new().unwrap();
        let adaptor = adaptor(&dir);
        // "AQID" is base64 for [1, 2, 3].
        let entry = Entry::new("dots").with_type("image/png").with_text("AQID");

        let outcome = adaptor.save(&entry).await.unwrap();
        assert_eq!(std::fs::read(dir.path().join("dots.png")).unwrap(), vec![1, 2, 3]);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("dots.png.meta")).unwrap(),
            "title: dots\ntype: image/png\n"
        );
        assert!(outcome.record.has_meta_file);
    }

    #[tokio::test]
    async fn test_untitled_entry_rejected() {
        let dir = TempDir::new().unwrap();
        let adaptor = adaptor(&dir);

        let err = adaptor.save(&Entry::new("")).await.unwrap_err();
        assert!(matches!(err, SyncError::Untitled));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
        assert_eq!(adaptor.revision(), 0);
    }

    #[tokio::test]
    async fn test_bad_base64_fails_before_marking() {
        let dir = TempDir::new().unwrap();
        let adaptor = adaptor(&dir);
        let entry = Entry::new("broken").with_type("image/png").with_text("!!!");

        let err = adaptor.save(&entry).await.unwrap_err();
        assert!(matches!(err, SyncError::Encoding { .. }));
        let path = dir.path().join("broken.png");
        assert!(!path.exists());
        assert_eq!(adaptor.registry().in_flight(&path), None);
    }

    #[tokio::test]
    async fn test_revisions_increase() {
        let dir = TempDir::new().unwrap();
        let adaptor = adaptor(&dir);

        let first = adaptor.save(&Entry::new("a")).await.unwrap();
        let second = adaptor.save(&Entry::new("a").with_text("more")).await.unwrap();
        assert!(second.revision > first.revision);
        assert_eq!(first.record.path, second.record.path);
    }

    #[tokio::test]
    async fn test_saved_content_is_recorded_for_echo_suppression() {
        let dir = TempDir::new().unwrap();
        let adaptor = adaptor(&dir);

        let outcome = adaptor.save(&Entry::new("a").with_text("body")).await.unwrap();
        let on_disk = std::fs::read(&outcome.record.path).unwrap();
        assert_eq!(
            adaptor.registry().observe(
                &outcome.record.path,
                &on_disk,
                adaptor.registry().last_seq(&outcome.record.path)
            ),
            Observation::Unchanged
        );
    }

    #[tokio::test]
    async fn test_write_failure_leaves_mark_set() {
        let dir = TempDir::new().unwrap();
        let adaptor = adaptor(&dir);
        // A directory where the file should go makes the write fail.
        let path = dir.path().join("blocked.tid");
        std::fs::create_dir(&path).unwrap();
        adaptor
            .index()
            .register("blocked", FileRecord::new(&path, "application/x-tiddler", false));

        let err = adaptor.save(&Entry::new("blocked")).await.unwrap_err();
        assert!(matches!(err, SyncError::Write { .. }));
        assert_eq!(adaptor.registry().in_flight(&path).as_deref(), Some("blocked"));

        adaptor.registry().release(&path);
        assert_eq!(adaptor.registry().in_flight(&path), None);
    }

    #[tokio::test]
    async fn test_load_is_noop() {
        let dir = TempDir::new().unwrap();
        assert_eq!(adaptor(&dir).load("anything").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete_unknown_title_succeeds() {
        let dir = TempDir::new().unwrap();
        adaptor(&dir).delete("never saved").await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_removes_body_and_sidecar() {
        let dir = TempDir::new().unwrap();
        let adaptor = adaptor(&dir);
        let outcome = adaptor
            .save(&Entry::new("dots").with_type("image/png").with_text("AQID"))
            .await
            .unwrap();

        adaptor.delete("dots").await.unwrap();
        assert!(!outcome.record.path.exists());
        assert!(!outcome.record.meta_path(".meta").exists());
        // The record outlives the files.
        assert!(adaptor.index().get("dots").is_some());
    }

    #[tokio::test]
    async fn test_delete_failure_keeps_sidecar() {
        let dir = TempDir::new().unwrap();
        let adaptor = adaptor(&dir);
        let record = FileRecord::new(dir.path().join("gone.png"), "image/png", true);
        std::fs::write(record.meta_path(".meta"), "title: gone\n").unwrap();
        adaptor.index().register("gone", record.clone());

        let err = adaptor.delete("gone").await.unwrap_err();
        assert!(matches!(err, SyncError::Delete { .. }));
        assert_eq!(err.io_kind(), Some(std::io::ErrorKind::NotFound));
        assert!(record.meta_path(".meta").exists());
    }

    #[tokio::test]
    async fn test_flows_published() {
        let dir = TempDir::new().unwrap();
        let bus = shared_entry_flow_bus(16);
        let mut sub = bus.subscribe("entry.>");
        let adaptor = adaptor(&dir).with_flows(bus);

        adaptor.save(&Entry::new("a")).await.unwrap();
        adaptor.delete("a").await.unwrap();

        assert_eq!(sub.try_recv().unwrap().subject, "entry.saved");
        assert_eq!(sub.try_recv().unwrap().subject, "entry.deleted");
    }
}
