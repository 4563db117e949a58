//! Change feed for store writes.
//!
//! Every successful create, update, or delete is broadcast so live
//! subscriptions can refetch their snapshot.

use tokio::sync::broadcast;
use tracing::trace;

use crate::model::{OwnerId, RecordId};

use super::Collection;

/// What happened to a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// A document was created.
    Created,
    /// A document was patched.
    Updated,
    /// A document was removed.
    Deleted,
}

/// One committed write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Collection written to.
    pub collection: Collection,
    /// Owner of the affected document.
    pub owner_id: OwnerId,
    /// Affected document.
    pub id: RecordId,
    /// Kind of write.
    pub kind: ChangeKind,
}

impl ChangeEvent {
    /// Whether a subscription on `collection` for `owner` should refetch.
    #[must_use]
    pub fn concerns(&self, collection: Collection, owner: &OwnerId) -> bool {
        self.collection == collection && &self.owner_id == owner
    }
}

/// Broadcast channel of [`ChangeEvent`]s.
#[derive(Debug, Clone)]
pub struct ChangeFeed {
    sender: broadcast::Sender<ChangeEvent>,
}

impl ChangeFeed {
    /// Create a feed with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    /// Create a feed holding up to `capacity` unread events per receiver.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event. Having no receivers is not an error.
    pub fn emit(&self, event: ChangeEvent) {
        trace!(?event, "Emitting change event");
        let _ = self.sender.send(event);
    }

    /// Receive future events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.sender.subscribe()
    }

    /// Number of live receivers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}
