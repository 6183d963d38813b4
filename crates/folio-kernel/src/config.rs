//! Engine configuration.
//!
//! Everything the engine needs to know up front is carried by a
//! [`SyncConfig`] handed to it at construction. Nothing is process-global, so
//! several engines can run side by side over different directories.

use std::path::{Path, PathBuf};
use std::time::Duration;

use regex::Regex;

use folio_types::TypeRegistry;

/// Extension of files the watcher folds back into the collection.
pub const DEFAULT_MANAGED_EXTENSION: &str = ".tid";

/// Base names matching this pattern are drafts and never reloaded.
pub const DEFAULT_DRAFT_PATTERN: &str = "^Draft_of_";

/// Suffix of sidecar metadata files.
pub const DEFAULT_META_SUFFIX: &str = ".meta";

/// Poll interval for watch backends that poll.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Sync engine configuration.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Directory holding one file per entry.
    pub root: PathBuf,
    /// Extension (with dot) of files the watcher considers.
    pub managed_extension: String,
    /// Draft base-name pattern.
    pub draft_pattern: Regex,
    /// Suffix appended to a body file's path for its sidecar.
    pub meta_suffix: String,
    /// Poll interval for the watch backend.
    pub poll_interval: Duration,
    /// Content-type tables.
    pub types: TypeRegistry,
}

impl SyncConfig {
    /// Configuration with stock settings for the given directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            managed_extension: DEFAULT_MANAGED_EXTENSION.to_string(),
            draft_pattern: default_draft_pattern(),
            meta_suffix: DEFAULT_META_SUFFIX.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            types: TypeRegistry::standard(),
        }
    }

    /// Get the target directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Set the managed extension. A leading dot is added if missing.
    pub fn with_managed_extension(mut self, extension: impl Into<String>) -> Self {
        let extension = extension.into();
        self.managed_extension = if extension.is_empty() || extension.starts_with('.') {
            extension
        } else {
            format!(".{extension}")
        };
        self
    }

    /// Set the draft pattern.
    pub fn with_draft_pattern(mut self, pattern: &str) -> Result<Self, regex::Error> {
        self.draft_pattern = Regex::new(pattern)?;
        Ok(self)
    }

    /// Set the sidecar suffix.
    pub fn with_meta_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.meta_suffix = suffix.into();
        self
    }

    /// Set the poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Replace the content-type tables.
    pub fn with_types(mut self, types: TypeRegistry) -> Self {
        self.types = types;
        self
    }
}

fn default_draft_pattern() -> Regex {
    Regex::new(DEFAULT_DRAFT_PATTERN).expect("default draft pattern is valid")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SyncConfig::new("/wiki/tiddlers");
        assert_eq!(config.root(), Path::new("/wiki/tiddlers"));
        assert_eq!(config.managed_extension, ".tid");
        assert_eq!(config.meta_suffix, ".meta");
        assert!(config.draft_pattern.is_match("Draft_of_HelloThere"));
        assert!(!config.draft_pattern.is_match("HelloThere"));
    }

    #[test]
    fn test_managed_extension_gets_dot() {
        let config = SyncConfig::new("/x").with_managed_extension("md");
        assert_eq!(config.managed_extension, ".md");
    }

    #[test]
    fn test_bad_draft_pattern() {
        assert!(SyncConfig::new("/x").with_draft_pattern("(").is_err());
    }
}
