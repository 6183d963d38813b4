//! # folio-kernel
//!
//! Two-way sync between an in-memory entry collection and a directory of
//! files.
//!
//! - Saves go through the [`SyncAdaptor`], which allocates a collision-free
//!   file name per title ([`FileIndex`], [`filename`]) and marks its writes
//!   in the [`SuppressionRegistry`].
//! - Edits made by other programs are picked up by the [`ChangeWatcher`],
//!   which discards the engine's own writes, folds the rest into the
//!   [`EntryStore`] and announces them on the [`NotificationChannel`].
//! - [`SyncEngine`] wires one of each over a directory.

pub mod adaptor;
pub mod boot;
pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod file_index;
pub mod filename;
pub mod flows;
pub mod notification;
pub mod render;
pub mod store;
pub mod suppression;
pub mod watcher;

pub use adaptor::{AdaptorInfo, SaveOutcome, SyncAdaptor};
pub use boot::BootReport;
pub use config::SyncConfig;
pub use engine::SyncEngine;
pub use error::{SyncError, SyncResult};
pub use file_index::FileIndex;
pub use filename::generate_filename;
pub use flows::{
    EntryFlow, FlowBus, FlowMessage, HasSubject, SharedEntryFlowBus, Subscription,
    matches_pattern, shared_entry_flow_bus,
};
pub use notification::{NotificationChannel, UPDATE_MESSAGE, UpdateMessage};
pub use render::{Renderer, TidRenderer};
pub use store::{EntryStore, MemoryEntryStore, SharedEntryStore, StoreEvent};
pub use suppression::{Observation, SuppressionRegistry, WriteToken};
pub use watcher::{
    ChangeKind, ChangeWatcher, EventOutcome, IgnoreReason, WatchEvent, WatchState, WatcherHandle,
};
