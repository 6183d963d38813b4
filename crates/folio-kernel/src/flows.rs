//! FlowBus pub/sub for sync events.
//!
//! The FlowBus provides a typed publish/subscribe mechanism for engine events.
//! Subscribers use NATS-style subject patterns to filter events of interest.
//!
//! # Pattern Matching
//!
//! Patterns use dot-separated tokens with wildcards:
//! - `*` matches exactly one token: `entry.*` matches `entry.saved`
//! - `>` matches one or more tokens (only at end): `entry.>` matches `entry.saved`
//! - Exact match: `entry.updated` only matches `entry.updated`
//!
//! # Example
//!
//! ```ignore
//! let bus = FlowBus::<EntryFlow>::new(256);
//! let mut sub = bus.subscribe("entry.updated");
//!
//! bus.publish(EntryFlow::Updated { title: "HelloThere".into(), path });
//!
//! while let Some(msg) = sub.recv().await {
//!     println!("Got: {}", msg.subject);
//! }
//! ```
//!
//! Publishing with no subscribers drops the message. There is no queueing
//! and no replay for late subscribers.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

// ============================================================================
// Pattern Matching
// ============================================================================

/// Check if a subject matches a pattern.
///
/// Patterns use NATS-style wildcards:
/// - `*` matches exactly one token
/// - `>` matches one or more tokens (only at end)
pub fn matches_pattern(pattern: &str, subject: &str) -> bool {
    let mut tokens = pattern.split('.').peekable();
    let mut subject = subject.split('.');

    while let Some(token) = tokens.next() {
        match (token, subject.next()) {
            (">", Some(_)) => return tokens.peek().is_none(),
            ("*", Some(_)) => {}
            (token, Some(part)) if token == part => {}
            _ => return false,
        }
    }
    subject.next().is_none()
}

// ============================================================================
// Flow Message Types
// ============================================================================

/// Trait for payloads that know their subject.
pub trait HasSubject {
    /// Get the subject string for this payload.
    fn subject(&self) -> &str;
}

/// A message published to the flow bus.
#[derive(Clone, Debug)]
pub struct FlowMessage<T> {
    /// The subject (derived from payload).
    pub subject: String,
    /// The payload data.
    pub payload: T,
    /// When this message was created.
    pub timestamp: Instant,
}

impl<T: HasSubject> FlowMessage<T> {
    /// Create a new flow message.
    pub fn new(payload: T) -> Self {
        Self {
            subject: payload.subject().to_string(),
            payload,
            timestamp: Instant::now(),
        }
    }
}

// ============================================================================
// Entry Flow Events
// ============================================================================

/// Entry sync events.
///
/// `Saved` and `Deleted` are emitted by the adaptor for its own disk writes.
/// `Updated` is emitted by the watcher for changes made by other processes;
/// it is what observers are told about.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryFlow {
    /// The adaptor wrote an entry to disk.
    Saved {
        title: String,
        path: PathBuf,
        revision: u64,
    },

    /// The adaptor removed an entry's files.
    Deleted { title: String, path: PathBuf },

    /// An entry changed on disk outside the engine and was loaded.
    Updated { title: String, path: PathBuf },
}

impl EntryFlow {
    /// Get the subject string for this event.
    pub fn subject(&self) -> &'static str {
        match self {
            Self::Saved { .. } => "entry.saved",
            Self::Deleted { .. } => "entry.deleted",
            Self::Updated { .. } => "entry.updated",
        }
    }

    /// Title of the entry this event concerns.
    pub fn title(&self) -> &str {
        match self {
            Self::Saved { title, .. } | Self::Deleted { title, .. } | Self::Updated { title, .. } => {
                title
            }
        }
    }
}

impl HasSubject for EntryFlow {
    fn subject(&self) -> &str {
        EntryFlow::subject(self)
    }
}

// ============================================================================
// FlowBus
// ============================================================================

/// Type-parameterized pub/sub bus for a specific flow domain.
///
/// Uses a broadcast channel internally for multi-subscriber delivery.
/// Subscribers receive only messages matching their pattern.
#[derive(Debug)]
pub struct FlowBus<T: Clone + Send + 'static> {
    tx: broadcast::Sender<FlowMessage<T>>,
    capacity: usize,
}

impl<T: Clone + Send + 'static> FlowBus<T> {
    /// Create a new flow bus with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Get the channel capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Get the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl<T: Clone + Send + HasSubject + 'static> FlowBus<T> {
    /// Publish a payload to the bus.
    ///
    /// Returns the number of subscribers that received the message (0 when
    /// nobody is listening; the message is dropped).
    pub fn publish(&self, payload: T) -> usize {
        self.tx.send(FlowMessage::new(payload)).unwrap_or(0)
    }

    /// Subscribe to messages matching a pattern.
    pub fn subscribe(&self, pattern: &str) -> Subscription<T> {
        Subscription {
            pattern: pattern.to_string(),
            rx: self.tx.subscribe(),
        }
    }
}

impl<T: Clone + Send + 'static> Clone for FlowBus<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            capacity: self.capacity,
        }
    }
}

/// Shared entry flow bus.
pub type SharedEntryFlowBus = Arc<FlowBus<EntryFlow>>;

/// Create a shared entry flow bus.
pub fn shared_entry_flow_bus(capacity: usize) -> SharedEntryFlowBus {
    Arc::new(FlowBus::new(capacity))
}

// ============================================================================
// Subscription
// ============================================================================

/// A subscription to a FlowBus with pattern filtering.
pub struct Subscription<T: Clone> {
    pattern: String,
    rx: broadcast::Receiver<FlowMessage<T>>,
}

impl<T: Clone> Subscription<T> {
    /// Get the subscription pattern.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Receive the next matching message, waiting if necessary.
    ///
    /// Returns None if the channel is closed.
    pub async fn recv(&mut self) -> Option<FlowMessage<T>> {
        loop {
            match self.rx.recv().await {
                Ok(msg) => {
                    if matches_pattern(&self.pattern, &msg.subject) {
                        return Some(msg);
                    }
                }
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(
                        pattern = %self.pattern,
                        lagged = n,
                        "Flow subscription lagged behind"
                    );
                }
            }
        }
    }

    /// Try to receive the next matching message without blocking.
    pub fn try_recv(&mut self) -> Option<FlowMessage<T>> {
        loop {
            match self.rx.try_recv() {
                Ok(msg) => {
                    if matches_pattern(&self.pattern, &msg.subject) {
                        return Some(msg);
                    }
                }
                Err(broadcast::error::TryRecvError::Empty)
                | Err(broadcast::error::TryRecvError::Closed) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    tracing::warn!(
                        pattern = %self.pattern,
                        lagged = n,
                        "Flow subscription lagged behind"
                    );
                }
            }
        }
    }
}

impl<T: Clone> std::fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("pattern", &self.pattern)
            .finish_non_exhaustive()
    }
}
