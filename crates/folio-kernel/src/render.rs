//! Templating collaborator.
//!
//! The engine asks a [`Renderer`] to turn an entry into file content by
//! template ID. Rendering is synchronous and I/O-free.

use folio_types::{Entry, METADATA_TEMPLATE, TID_TEMPLATE};

use crate::codec;
use crate::error::{SyncError, SyncResult};

/// Turns an entry into file content.
pub trait Renderer: Send + Sync {
    /// Render `entry` through the template named `template`.
    fn render(&self, entry: &Entry, template: &str) -> SyncResult<String>;
}

/// Renderer for the two stock templates: a self-contained `.tid` file and a
/// sidecar metadata block.
#[derive(Debug, Clone, Copy, Default)]
pub struct TidRenderer;

impl Renderer for TidRenderer {
    fn render(&self, entry: &Entry, template: &str) -> SyncResult<String> {
        let rendered = match template {
            TID_TEMPLATE => codec::render_tid(entry),
            METADATA_TEMPLATE => codec::render_fields(entry),
            other => return Err(SyncError::Render(format!("unknown template {other}"))),
        };
        rendered.map_err(|reason| SyncError::Render(format!("{}: {reason}", entry.title)))
    }
}
