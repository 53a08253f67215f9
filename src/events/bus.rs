//! In-process bus broadcasting storage lifecycle events.

use crate::error::{Result, StatsError};
use crate::types::StorageLifecycleEvent;
use crossbeam_channel::{bounded, Sender, TrySendError};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::{debug, warn};

use super::types::{BusConfig, BusMessage, DropReason, EventFilter, EventSubscription, SubscriptionId};

struct Subscriber {
    filter: EventFilter,
    sender: Sender<BusMessage>,
}

impl Subscriber {
    /// Returns false if the buffer is full or the receiver is gone.
    fn try_send(&self, message: BusMessage) -> bool {
        match self.sender.try_send(message) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

/// Broadcasts storage lifecycle events to filtered subscribers.
///
/// Each subscriber has a bounded buffer; a subscriber that falls behind is
/// dropped rather than blocking publishers.
pub struct StorageEventBus {
    subscribers: RwLock<HashMap<SubscriptionId, Subscriber>>,
    next_id: AtomicU64,
    closed: AtomicBool,
}

impl StorageEventBus {
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            closed: AtomicBool::new(false),
        }
    }

    /// Register a subscriber.
    pub fn subscribe(&self, config: BusConfig) -> Result<EventSubscription> {
        let mut subs = self.subscribers.write();
        if self.closed.load(Ordering::Acquire) {
            return Err(StatsError::BusClosed);
        }
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (sender, receiver) = bounded(config.buffer_size.max(1));
        subs.insert(
            id,
            Subscriber {
                filter: config.filter,
                sender,
            },
        );
        Ok(EventSubscription { id, receiver })
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        if let Some(sub) = self.subscribers.write().remove(&id) {
            let _ = sub.try_send(BusMessage::Dropped {
                reason: DropReason::Unsubscribed,
            });
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Deliver an event to every matching subscriber.
    ///
    /// Returns how many subscribers received it.
    pub fn publish(&self, event: &StorageLifecycleEvent) -> Result<usize> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StatsError::BusClosed);
        }

        let mut delivered = 0;
        let mut to_remove = Vec::new();
        {
            let subs = self.subscribers.read();
            for (id, sub) in subs.iter() {
                if !sub.filter.matches(event) {
                    continue;
                }
                let message = BusMessage::Event {
                    event: event.clone(),
                };
                if sub.try_send(message) {
                    delivered += 1;
                } else {
                    to_remove.push(*id);
                }
            }
        }

        if !to_remove.is_empty() {
            let mut subs = self.subscribers.write();
            for id in to_remove {
                if let Some(sub) = subs.remove(&id) {
                    warn!(subscription = id.0, "Dropping slow storage event subscriber");
                    let _ = sub.try_send(BusMessage::Dropped {
                        reason: DropReason::BufferOverflow,
                    });
                }
            }
        }

        Ok(delivered)
    }

    /// Close the bus. Subscribers receive their buffered events, then a
    /// `Dropped { Closed }` message, then disconnect.
    pub fn close(&self) {
        let mut subs = self.subscribers.write();
        self.closed.store(true, Ordering::Release);
        let count = subs.len();
        for (_, sub) in subs.drain() {
            let _ = sub.try_send(BusMessage::Dropped {
                reason: DropReason::Closed,
            });
        }
        debug!(subscribers = count, "Storage event bus closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl Default for StorageEventBus {
    fn default() -> Self {
        Self::new()
    }
}
