//! Storage lifecycle event delivery.
//!
//! Hosts publish CREATE/DELETE/UPDATE events on a [`StorageEventBus`];
//! subscribers receive the kinds they asked for through bounded channels.
//! A subscriber that falls behind is dropped.
//!
//! # Example
//!
//! ```ignore
//! let bus = StorageEventBus::new();
//! let aggregator = Arc::new(TagCountAggregator::new());
//!
//! let subscription = bus.subscribe(BusConfig::default())?;
//! let worker = spawn_aggregator_worker(subscription, Arc::clone(&aggregator))?;
//!
//! bus.publish(&StorageLifecycleEvent::create(StorageId(1), tagged))?;
//! ```

mod bus;
mod types;
mod worker;

pub use bus::StorageEventBus;
pub use types::{BusConfig, BusMessage, DropReason, EventFilter, EventSubscription, SubscriptionId};
pub use worker::spawn_aggregator_worker;
