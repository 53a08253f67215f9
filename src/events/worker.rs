//! Worker thread feeding bus events into an aggregator.

use crate::counts::{EventDisposition, TagCountAggregator};
use crate::error::Result;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::debug;

use super::types::{BusMessage, EventSubscription};

/// Spawn a thread applying every event from `subscription` to `aggregator`,
/// in delivery order, until the subscription is dropped or disconnected.
///
/// The thread returns how many events it handed to the aggregator.
pub fn spawn_aggregator_worker(
    subscription: EventSubscription,
    aggregator: Arc<TagCountAggregator>,
) -> Result<JoinHandle<u64>> {
    let handle = thread::Builder::new()
        .name(format!("tag-count-{}", subscription.id.0))
        .spawn(move || {
            let mut handled = 0u64;
            while let Ok(message) = subscription.recv() {
                match message {
                    BusMessage::Event { event } => {
                        if aggregator.apply_event(event) == EventDisposition::Queued {
                            debug!("Storage event queued behind running rescan");
                        }
                        handled += 1;
                    }
                    BusMessage::Dropped { reason } => {
                        debug!(?reason, "Tag count worker subscription dropped");
                        break;
                    }
                }
            }
            handled
        })?;
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{BusConfig, StorageEventBus};
    use crate::types::{StorageId, StorageLifecycleEvent, TagGroupId, TagId, TaggedValue};

    #[test]
    fn test_worker_applies_in_order() {
        let bus = StorageEventBus::new();
        let aggregator = Arc::new(TagCountAggregator::new());
        let sub = bus.subscribe(BusConfig::default()).unwrap();
        let worker = spawn_aggregator_worker(sub, Arc::clone(&aggregator)).unwrap();

        let value = vec![TaggedValue::new(1, 10)];
        bus.publish(&StorageLifecycleEvent::create(StorageId(1), value.clone())).unwrap();
        bus.publish(&StorageLifecycleEvent::create(StorageId(2), value.clone())).unwrap();
        bus.publish(&StorageLifecycleEvent::delete(StorageId(1), value)).unwrap();
        bus.close();

        assert_eq!(worker.join().unwrap(), 3);
        assert_eq!(aggregator.count(TagGroupId(1), TagId(10)), Some(1));
    }
}
