//! Types for the storage event bus.

use crate::types::{StorageEventKind, StorageLifecycleEvent};
use serde::{Deserialize, Serialize};

/// Configuration for a bus subscription.
#[derive(Clone, Debug)]
pub struct BusConfig {
    /// Max buffered messages before dropping the subscriber.
    /// Default: 1024
    pub buffer_size: usize,

    /// Which events to deliver.
    pub filter: EventFilter,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            buffer_size: 1024,
            filter: EventFilter::counting(),
        }
    }
}

/// Event kinds a subscriber wants.
#[derive(Clone, Debug, Default)]
pub struct EventFilter {
    pub kinds: Vec<StorageEventKind>,
}

impl EventFilter {
    /// Only the given kinds.
    pub fn kinds(kinds: Vec<StorageEventKind>) -> Self {
        Self { kinds }
    }

    /// The kinds a tag counter listens to.
    pub fn counting() -> Self {
        Self::kinds(vec![
            StorageEventKind::Create,
            StorageEventKind::Delete,
            StorageEventKind::Update,
        ])
    }

    pub fn matches(&self, event: &StorageLifecycleEvent) -> bool {
        self.kinds.contains(&event.kind)
    }
}

/// Messages delivered to a subscriber.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusMessage {
    /// A storage lifecycle event.
    Event { event: StorageLifecycleEvent },

    /// Subscription was dropped; no further messages follow.
    Dropped { reason: DropReason },
}

/// Why a subscription was dropped.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Send buffer overflowed (slow consumer).
    BufferOverflow,
    /// Explicitly unsubscribed.
    Unsubscribed,
    /// The bus was closed.
    Closed,
}

/// Unique identifier for a subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Receiving end of a bus subscription.
pub struct EventSubscription {
    pub id: SubscriptionId,
    pub receiver: crossbeam_channel::Receiver<BusMessage>,
}

impl EventSubscription {
    /// Receive the next message (blocking).
    pub fn recv(&self) -> Result<BusMessage, crossbeam_channel::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive a message (non-blocking).
    pub fn try_recv(&self) -> Result<BusMessage, crossbeam_channel::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(
        &self,
        timeout: std::time::Duration,
    ) -> Result<BusMessage, crossbeam_channel::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }
}
