//! Statistics registry and dated persistence.
//!
//! Tasks register under statistics keys. The service answers live queries,
//! persists each key's raw statistics per calendar date when its version
//! changed, and answers "at date" and "between dates" queries from the store.

mod service;
mod store;
mod task;

pub use service::{DatedData, ServiceConfig, StatisticsService};
pub use store::{
    DatedStatistics, FileStatisticsStore, FileStoreConfig, MemoryStatisticsStore, StatisticsStore,
};
pub use task::{StatisticsTask, TagCountStatistics, TAG_COUNT_KEY};
