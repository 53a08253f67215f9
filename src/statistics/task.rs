//! Statistics tasks: named producers of raw statistics.

use crate::counts::{decode_raw, TagCountAggregator};
use crate::error::Result;
use crate::report::{build_report, TagLookup};
use crate::source::TagValueSource;
use crate::types::{RawStatistics, StatisticsVersion};
use std::sync::Arc;

/// Key under which tag counts are registered.
pub const TAG_COUNT_KEY: &str = "tag_count";

/// A producer of statistics under one or more keys.
///
/// Raw statistics are what gets persisted; `render` turns raw statistics
/// (live or persisted) into the reported view.
pub trait StatisticsTask: Send + Sync {
    fn keys(&self) -> Vec<String>;

    fn raw_statistics(&self, key: &str) -> RawStatistics;

    /// Bumped whenever the raw statistics change.
    fn version(&self) -> StatisticsVersion;

    /// Recompute from ground truth.
    fn rescan(&self) -> Result<()>;

    fn render(&self, key: &str, raw: &RawStatistics) -> Result<serde_json::Value>;

    /// Seed live state from persisted raw statistics.
    fn restore(&self, _key: &str, _raw: &RawStatistics) {}
}

/// Tag counts exposed as a statistics task.
pub struct TagCountStatistics {
    aggregator: Arc<TagCountAggregator>,
    source: Arc<dyn TagValueSource>,
    lookup: Arc<dyn TagLookup>,
}

impl TagCountStatistics {
    pub fn new(
        aggregator: Arc<TagCountAggregator>,
        source: Arc<dyn TagValueSource>,
        lookup: Arc<dyn TagLookup>,
    ) -> Self {
        Self {
            aggregator,
            source,
            lookup,
        }
    }

    pub fn aggregator(&self) -> &Arc<TagCountAggregator> {
        &self.aggregator
    }
}

impl StatisticsTask for TagCountStatistics {
    fn keys(&self) -> Vec<String> {
        vec![TAG_COUNT_KEY.to_string()]
    }

    fn raw_statistics(&self, _key: &str) -> RawStatistics {
        self.aggregator.raw_statistics()
    }

    fn version(&self) -> StatisticsVersion {
        self.aggregator.version()
    }

    fn rescan(&self) -> Result<()> {
        self.aggregator.rescan(self.source.as_ref())?;
        Ok(())
    }

    fn render(&self, _key: &str, raw: &RawStatistics) -> Result<serde_json::Value> {
        let report = build_report(raw, self.lookup.as_ref());
        Ok(serde_json::to_value(report)?)
    }

    fn restore(&self, _key: &str, raw: &RawStatistics) {
        self.aggregator.restore(decode_raw(raw));
    }
}
