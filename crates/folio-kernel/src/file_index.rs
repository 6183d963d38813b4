//! Entry title → on-disk file record.
//!
//! Records are created lazily on the first save of an entry and then kept
//! for the life of the process. Creating one lists the target directory and
//! runs the file name generator against everything already there.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;

use folio_types::{Entry, FileRecord, TypeRegistry};

use crate::error::{SyncError, SyncResult};
use crate::filename::generate_filename;

/// Mapping from entry title to file record.
pub struct FileIndex {
    root: PathBuf,
    types: Arc<TypeRegistry>,
    records: DashMap<String, FileRecord>,
    /// Serializes name allocation so two new entries never pick the same file.
    allocate: Mutex<()>,
}

impl FileIndex {
    /// Create an empty index for files under `root`.
    pub fn new(root: impl Into<PathBuf>, types: Arc<TypeRegistry>) -> Self {
        Self {
            root: root.into(),
            types,
            records: DashMap::new(),
            allocate: Mutex::new(()),
        }
    }

    /// Get the target directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Record for `title`, if one exists.
    pub fn get(&self, title: &str) -> Option<FileRecord> {
        self.records.get(title).map(|r| r.value().clone())
    }

    /// Register a record for a file that already exists (e.g. found at boot).
    pub fn register(&self, title: impl Into<String>, record: FileRecord) {
        self.records.insert(title.into(), record);
    }

    /// Clear the record for `title`, so the next save allocates a fresh file.
    pub fn forget(&self, title: &str) -> Option<FileRecord> {
        self.records.remove(title).map(|(_, record)| record)
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the index is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Content type layout table used for allocation.
    pub fn types(&self) -> &Arc<TypeRegistry> {
        &self.types
    }

    /// Return the record for `entry`, allocating a new file name on first use.
    ///
    /// Directory listing errors are returned unchanged and leave the index
    /// untouched.
    pub async fn resolve(&self, entry: &Entry) -> SyncResult<FileRecord> {
        if let Some(record) = self.get(&entry.title) {
            return Ok(record);
        }

        let _guard = self.allocate.lock().await;
        // Another save may have allocated while we waited.
        if let Some(record) = self.get(&entry.title) {
            return Ok(record);
        }

        let resolved = self.types.resolve(entry.content_type());
        let mut existing = list_file_names(&self.root).await?;
        // Names claimed by records whose files are not written yet.
        existing.extend(self.records.iter().filter_map(|r| r.value().file_name()));

        let filename = generate_filename(&entry.title, &resolved.extension, &existing);
        let record = FileRecord::new(
            self.root.join(&filename),
            resolved.file_type,
            resolved.has_meta_file,
        );

        tracing::debug!(title = %entry.title, file = %filename, "allocated file");
        self.records.insert(entry.title.clone(), record.clone());
        Ok(record)
    }
}

/// Names of everything in `dir`.
pub(crate) async fn list_file_names(dir: &Path) -> SyncResult<Vec<String>> {
    let mut reader = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| SyncError::directory(dir, e))?;

    let mut names = Vec::new();
    while let Some(entry) = reader
        .next_entry()
        .await
        .map_err(|e| SyncError::directory(dir, e))?
    {
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    Ok(names)
}
