//! Shared entry and storage types for folio.
//!
//! This crate is the leaf of the workspace: the in-memory document shape,
//! the per-entry on-disk record, and the content-type tables that decide how
//! an entry is laid out on disk. It has **no internal folio dependencies**.
//!
//! # Key Types
//!
//! |-------------------|----------------------------------------------------|
//! | Type              | Purpose                                            |
//! |-------------------|----------------------------------------------------|
//! | [`Entry`]         | Named document: title, fields, body text           |
//! | [`FileRecord`]    | Where an entry lives on disk and how it is stored  |
//! | [`TypeInfo`]      | Extension / file type / sidecar for a content type |
//! | [`Encoding`]      | How an entry body is held in memory (utf8, base64) |
//! | [`TypeRegistry`]  | Configuration object holding all of the above      |
//! |-------------------|----------------------------------------------------|

pub mod entry;
pub mod record;
pub mod type_info;

pub use entry::Entry;
pub use record::FileRecord;
pub use type_info::{
    DEFAULT_CONTENT_TYPE, Encoding, METADATA_TEMPLATE, ResolvedType, TID_FILE_TYPE, TID_TEMPLATE,
    TypeInfo, TypeRegistry,
};
