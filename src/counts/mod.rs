//! Tag count statistics.
//!
//! The aggregator keeps an in-memory count of how many stored items carry
//! each (tag group, tag) pair:
//! - CREATE events increment, DELETE events decrement, UPDATE is ignored
//! - A rescan rebuilds the counts from an authoritative source
//! - Events that arrive during a rescan are queued and replayed in order
//!
//! # Example
//!
//! ```ignore
//! let aggregator = TagCountAggregator::new();
//!
//! aggregator.apply_event(StorageLifecycleEvent::create(
//!     StorageId(7),
//!     vec![TaggedValue::new(1, 10)],
//! ));
//! assert_eq!(aggregator.count(TagGroupId(1), TagId(10)), Some(1));
//!
//! // Rebuild from persisted data
//! aggregator.rescan(&source)?;
//! ```

mod aggregator;
mod codec;
mod table;

pub use aggregator::{EventDisposition, RescanOutcome, TagCountAggregator};
pub use codec::{decode_raw, deserialize_counts, encode_snapshot, serialize_counts};
