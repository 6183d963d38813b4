//! Per-entry on-disk location.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Where an entry lives on disk and how it is stored there.
///
/// Created on the first save of an entry and stable for the entry's lifetime.
/// Renames are a delete followed by a save under the new title.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Absolute path of the primary file.
    pub path: PathBuf,
    /// Stored content type (e.g. `application/x-tiddler`, `image/png`).
    pub file_type: String,
    /// Whether a companion metadata file sits next to the primary file.
    pub has_meta_file: bool,
}

impl FileRecord {
    /// Create a new record.
    pub fn new(path: impl Into<PathBuf>, file_type: impl Into<String>, has_meta_file: bool) -> Self {
        Self {
            path: path.into(),
            file_type: file_type.into(),
            has_meta_file,
        }
    }

    /// Path of the sidecar metadata file: the primary path plus `suffix`.
    pub fn meta_path(&self, suffix: &str) -> PathBuf {
        append_suffix(&self.path, suffix)
    }

    /// File name of the primary file, if it has one.
    pub fn file_name(&self) -> Option<String> {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
    }
}

fn append_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut raw: OsString = path.as_os_str().to_owned();
    raw.push(suffix);
    PathBuf::from(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meta_path_appends_suffix() {
        let record = FileRecord::new("/wiki/tiddlers/photo.jpg", "image/jpeg", true);
        assert_eq!(
            record.meta_path(".meta"),
            PathBuf::from("/wiki/tiddlers/photo.jpg.meta")
        );
    }

    #[test]
    fn test_file_name() {
        let record = FileRecord::new("/wiki/tiddlers/a_b 1.tid", "application/x-tiddler", false);
        assert_eq!(record.file_name().as_deref(), Some("a_b 1.tid"));
    }
}
