//! Sync engine error types.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Sync engine error type.
///
/// Every failure propagates exactly one level up, to the caller of the
/// operation that hit it. The engine never retries internally.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Listing or reading the target directory failed.
    #[error("cannot access directory {}: {source}", path.display())]
    DirectoryAccess {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Writing a file failed. Earlier writes of the same save are kept.
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Deleting a file failed. Earlier deletes of the same call are kept.
    #[error("failed to delete {}: {source}", path.display())]
    Delete {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A watched file could not be parsed into entry fields.
    #[error("unreadable entry file {}: {reason}", path.display())]
    UnreadableEntry { path: PathBuf, reason: String },

    /// An entry with an empty title cannot be stored; its file would not
    /// load back.
    #[error("entry has no title")]
    Untitled,

    /// The renderer could not produce file content.
    #[error("render error: {0}")]
    Render(String),

    /// An entry body does not match its content type's encoding.
    #[error("cannot encode body of {title}: {reason}")]
    Encoding { title: String, reason: String },

    /// The watch backend could not be set up.
    #[error("watch error: {0}")]
    Watch(String),
}

impl SyncError {
    /// Create a DirectoryAccess error.
    pub fn directory(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::DirectoryAccess {
            path: path.into(),
            source,
        }
    }

    /// Create a Write error.
    pub fn write(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Write {
            path: path.into(),
            source,
        }
    }

    /// Create a Delete error.
    pub fn delete(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Delete {
            path: path.into(),
            source,
        }
    }

    /// Create an UnreadableEntry error.
    pub fn unreadable(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::UnreadableEntry {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Underlying I/O error kind, if this error wraps one.
    pub fn io_kind(&self) -> Option<io::ErrorKind> {
        match self {
            Self::DirectoryAccess { source, .. }
            | Self::Write { source, .. }
            | Self::Delete { source, .. } => Some(source.kind()),
            _ => None,
        }
    }
}

/// Sync result type.
pub type SyncResult<T> = Result<T, SyncError>;
