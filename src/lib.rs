//! # Tag Statistics
//!
//! In-memory tag-count statistics for a file storage backend.
//!
//! ## Core Concepts
//!
//! - **Aggregator**: Counts stored items per (tag group, tag), updated from
//!   storage lifecycle events
//! - **Rescan**: Single-flight rebuild from persisted data; events arriving
//!   meanwhile are queued and replayed in order
//! - **Event bus**: In-process delivery of storage events to the aggregator
//! - **Statistics service**: Live queries plus per-date persistence of raw
//!   counters in the `tagId:count,` format
//!
//! ## Example
//!
//! ```ignore
//! use tagstats::{StorageId, StorageLifecycleEvent, TagCountAggregator, TaggedValue};
//!
//! let aggregator = TagCountAggregator::new();
//! aggregator.apply_event(StorageLifecycleEvent::create(
//!     StorageId(1),
//!     vec![TaggedValue::new(1, 10)],
//! ));
//!
//! // Rebuild from the authoritative source
//! aggregator.rescan(&source)?;
//!
//! let snapshot = aggregator.snapshot();
//! ```

pub mod counts;
pub mod error;
pub mod events;
pub mod report;
pub mod source;
pub mod statistics;
pub mod types;

// Re-exports
pub use counts::{
    decode_raw, deserialize_counts, encode_snapshot, serialize_counts, EventDisposition,
    RescanOutcome, TagCountAggregator,
};
pub use error::{Result, StatsError};
pub use events::{
    spawn_aggregator_worker, BusConfig, BusMessage, DropReason, EventFilter, EventSubscription,
    StorageEventBus, SubscriptionId,
};
pub use report::{
    build_report, TagDirectory, TagGroupInfo, TagGroupValueCount, TagInfo, TagLookup,
    TagValueCount,
};
pub use source::{StorageTagValue, TagValueSource, VecTagValueSource};
pub use statistics::{
    DatedData, DatedStatistics, FileStatisticsStore, FileStoreConfig, MemoryStatisticsStore,
    ServiceConfig, StatisticsService, StatisticsStore, StatisticsTask, TagCountStatistics,
    TAG_COUNT_KEY,
};
pub use types::*;
