//! Boot scan: load what is already on disk.
//!
//! Runs once when the engine opens, before watching starts. Every managed
//! file and every body + sidecar pair becomes an entry in the collection,
//! gets its FileRecord registered (so a later save reuses the same file) and
//! has its content fingerprint seeded (so the watcher does not reapply it).

use std::path::{Path, PathBuf};

use base64::Engine as _;

use folio_types::{Encoding, Entry, FileRecord, TypeRegistry};

use crate::codec;
use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::file_index::{FileIndex, list_file_names};
use crate::store::EntryStore;
use crate::suppression::SuppressionRegistry;

/// Summary of a boot scan.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BootReport {
    /// Titles loaded into the collection, in directory order.
    pub loaded: Vec<String>,
    /// Files that looked like entries but could not be read.
    pub skipped: Vec<PathBuf>,
}

/// Load every entry file under the index root into `store`.
pub async fn load_directory(
    config: &SyncConfig,
    index: &FileIndex,
    registry: &SuppressionRegistry,
    store: &dyn EntryStore,
) -> SyncResult<BootReport> {
    let root = index.root();
    let mut names = list_file_names(root).await?;
    names.sort();

    let mut report = BootReport::default();
    for name in &names {
        if name.starts_with('.') || name.ends_with(&config.meta_suffix) {
            continue;
        }
        let path = root.join(name);
        let meta_name = format!("{name}{}", config.meta_suffix);
        let meta_path = root.join(&meta_name);

        let loaded = if name.ends_with(&config.managed_extension) {
            load_tid(&path, index.types()).await.map(Some)
        } else if names.contains(&meta_name) {
            load_pair(&path, &meta_path, index.types()).await.map(Some)
        } else {
            Ok(None)
        };

        match loaded {
            Ok(Some((entry, record, bytes))) => {
                registry.seed(&record.path, &bytes);
                index.register(&entry.title, record);
                report.loaded.push(entry.title.clone());
                store.add_or_update(entry);
            }
            Ok(None) => {
                tracing::trace!(path = %path.display(), "not an entry file");
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipped at boot");
                report.skipped.push(path);
            }
        }
    }

    tracing::info!(
        path = %root.display(),
        loaded = report.loaded.len(),
        skipped = report.skipped.len(),
        "boot scan complete"
    );
    Ok(report)
}

type Loaded = (Entry, FileRecord, Vec<u8>);

async fn read(path: &Path) -> SyncResult<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .map_err(|e| SyncError::directory(path, e))
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

async fn load_tid(path: &Path, types: &TypeRegistry) -> SyncResult<Loaded> {
    let bytes = read(path).await?;
    let text = std::str::from_utf8(&bytes).map_err(|e| SyncError::unreadable(path, e.to_string()))?;
    let entry = codec::parse_tid(text, &file_stem(path))
        .map_err(|reason| SyncError::unreadable(path, reason))?;

    let resolved = types.resolve(entry.content_type());
    let record = FileRecord::new(path, resolved.file_type, false);
    Ok((entry, record, bytes))
}

async fn load_pair(path: &Path, meta_path: &Path, types: &TypeRegistry) -> SyncResult<Loaded> {
    let meta = read(meta_path).await?;
    let meta = std::str::from_utf8(&meta)
        .map_err(|e| SyncError::unreadable(meta_path, e.to_string()))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut entry = codec::parse_fields(meta, &file_name)
        .map_err(|reason| SyncError::unreadable(meta_path, reason))?;

    if entry.content_type().is_none() {
        let extension = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        if let Some(content_type) = types.content_type_for_extension(&extension) {
            entry = entry.with_type(content_type);
        }
    }

    let bytes = read(path).await?;
    let content_type = entry.content_type().unwrap_or(types.default_type()).to_string();
    entry.text = match types.encoding(&content_type) {
        Encoding::Base64 => base64::engine::general_purpose::STANDARD.encode(&bytes),
        Encoding::Utf8 => String::from_utf8(bytes.clone())
            .map_err(|e| SyncError::unreadable(path, e.to_string()))?,
    };

    let resolved = types.resolve(Some(&content_type));
    let record = FileRecord::new(path, resolved.file_type, true);
    Ok((entry, record, bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryEntryStore;
    use crate::suppression::Observation;
    use std::sync::Arc;
    use tempfile::TempDir;

    async fn boot(dir: &TempDir) -> (BootReport, FileIndex, SuppressionRegistry, MemoryEntryStore) {
        let config = SyncConfig::new(dir.path());
        let index = FileIndex::new(dir.path(), Arc::new(config.types.clone()));
        let registry = SuppressionRegistry::new();
        let store = MemoryEntryStore::new();
        let report = load_directory(&config, &index, &registry, &store).await.unwrap();
        (report, index, registry, store)
    }

    #[tokio::test]
    async fn test_loads_tid_files() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("Hello_There.tid"), "title: Hello There\n\nHi").unwrap();

        let (report, index, registry, store) = boot(&dir).await;
        assert_eq!(report.loaded, vec!["Hello There".to_string()]);
        assert_eq!(store.get("Hello There").unwrap().text, "Hi");

        let record = index.get("Hello There").unwrap();
        assert_eq!(record.path, dir.path().join("Hello_There.tid"));
        assert!(!record.has_meta_file);
        assert_eq!(
            registry.observe(&record.path, b"title: Hello There\n\nHi", 0),
            Observation::Unchanged
        );
    }

    #[tokio::test]
    async fn test_loads_body_and_sidecar() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("dots.png"), [1u8, 2, 3]).unwrap();
        std::fs::write(dir.path().join("dots.png.meta"), "title: dots\n").unwrap();

        let (report, index, _, store) = boot(&dir).await;
        assert_eq!(report.loaded, vec!["dots".to_string()]);

        let entry = store.get("dots").unwrap();
        assert_eq!(entry.content_type(), Some("image/png"));
        assert_eq!(entry.text, "AQID");
        assert!(index.get("dots").unwrap().has_meta_file);
    }

    #[tokio::test]
    async fn test_skips_unreadable_and_unrelated() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("broken.tid"), "nonsense").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "plain").unwrap();
        std::fs::write(dir.path().join(".hidden.tid"), "title: h\n\n").unwrap();

        let (report, _, _, store) = boot(&dir).await;
        assert!(report.loaded.is_empty());
        assert_eq!(report.skipped, vec![dir.path().join("broken.tid")]);
        assert!(store.is_empty());
    }
}
