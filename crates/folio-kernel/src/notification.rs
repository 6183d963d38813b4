//! Observer notifications for externally changed entries.
//!
//! [`NotificationChannel::notify`] publishes `entry.updated` on the flow bus.
//! Whoever holds live observer connections (the server's WebSocket endpoint)
//! subscribes and forwards [`UpdateMessage`] frames. With nobody listening
//! the notification is dropped: at-most-once, no queueing, no retry.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::flows::{EntryFlow, SharedEntryFlowBus};

/// Value of the `message` field in every update frame.
pub const UPDATE_MESSAGE: &str = "update_tiddler";

/// Wire message pushed to observers: `{"message":"update_tiddler","title":...}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateMessage {
    pub message: String,
    pub title: String,
}

impl UpdateMessage {
    /// Update frame for the given title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            message: UPDATE_MESSAGE.to_string(),
            title: title.into(),
        }
    }

    /// JSON encoding of this frame.
    pub fn to_json(&self) -> String {
        // A struct of two strings always serializes.
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Fan-out of "entry updated externally" events.
#[derive(Clone, Debug)]
pub struct NotificationChannel {
    bus: SharedEntryFlowBus,
}

impl NotificationChannel {
    /// Create a channel publishing on `bus`.
    pub fn new(bus: SharedEntryFlowBus) -> Self {
        Self { bus }
    }

    /// The underlying bus, for observers to subscribe to.
    pub fn bus(&self) -> &SharedEntryFlowBus {
        &self.bus
    }

    /// Tell observers that `title` changed on disk at `path`.
    ///
    /// Returns how many observers were reached.
    pub fn notify(&self, title: &str, path: &Path) -> usize {
        let delivered = self.bus.publish(EntryFlow::Updated {
            title: title.to_string(),
            path: path.to_path_buf(),
        });
        if delivered == 0 {
            tracing::trace!(title = %title, "no observers for update");
        }
        delivered
    }
}
