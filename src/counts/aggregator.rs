//! Tag count aggregator with single-flight rescan and pending event replay.

use crate::error::Result;
use crate::source::TagValueSource;
use crate::types::{
    RawStatistics, StatisticsVersion, StorageEventKind, StorageLifecycleEvent, TagCount,
    TagCountSnapshot, TagGroupId, TagId,
};
use parking_lot::{Mutex, RwLock};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::{debug, info, warn};

use super::codec::encode_snapshot;
use super::table::CountTable;

/// What happened to an event handed to `apply_event`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventDisposition {
    /// Counts were updated.
    Applied,
    /// The event carried no count delta.
    Ignored,
    /// A rescan is running; the event waits in the pending queue.
    Queued,
}

/// Result of a rescan request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RescanOutcome {
    /// This call ran the rescan.
    Completed {
        /// Tagged values read from the source.
        scanned: u64,
        /// Queued events replayed after the swap.
        replayed: usize,
    },
    /// Another rescan was already running; this request was dropped.
    AlreadyRunning,
}

/// Keeps per-(group, tag) occurrence counts of stored items.
///
/// Events are applied incrementally while idle. A rescan rebuilds the
/// counts from an authoritative source; events arriving meanwhile are
/// queued and replayed in arrival order once the new counts are swapped in.
pub struct TagCountAggregator {
    /// Live counts. Swapped whole at the end of a rescan.
    live: RwLock<CountTable>,
    /// Statistics version, bumped on every applied mutation.
    version: AtomicU64,
    /// Single-flight flag for rescans.
    rescanning: AtomicBool,
    /// Events received while rescanning, in arrival order.
    pending: Mutex<VecDeque<StorageLifecycleEvent>>,
    /// Appliers hold this shared; rescan start and finish hold it exclusively
    /// so the flag flips never interleave with an in-flight apply.
    transition: RwLock<()>,
}

impl TagCountAggregator {
    pub fn new() -> Self {
        Self {
            live: RwLock::new(CountTable::default()),
            version: AtomicU64::new(0),
            rescanning: AtomicBool::new(false),
            pending: Mutex::new(VecDeque::new()),
            transition: RwLock::new(()),
        }
    }

    /// Apply a storage lifecycle event, or queue it if a rescan is running.
    pub fn apply_event(&self, event: StorageLifecycleEvent) -> EventDisposition {
        let _gate = self.transition.read();
        if self.rescanning.load(Ordering::Acquire) {
            self.pending.lock().push_back(event);
            return EventDisposition::Queued;
        }
        debug!(
            kind = ?event.kind,
            storage = ?event.storage,
            size = event.size,
            tagged_values = event.tagged_values.len(),
            "Got storage lifecycle event"
        );
        self.process(&event)
    }

    /// Immutable copy of the current counts.
    pub fn snapshot(&self) -> TagCountSnapshot {
        self.live.read().snapshot()
    }

    /// Current count for a pair, if tracked.
    pub fn count(&self, group_id: TagGroupId, tag_id: TagId) -> Option<u64> {
        self.live.read().count(group_id, tag_id)
    }

    /// Current snapshot in the persisted `tagId:count,` format keyed by group id.
    pub fn raw_statistics(&self) -> RawStatistics {
        encode_snapshot(&self.snapshot())
    }

    pub fn version(&self) -> StatisticsVersion {
        StatisticsVersion(self.version.load(Ordering::Acquire))
    }

    pub fn is_rescanning(&self) -> bool {
        self.rescanning.load(Ordering::Acquire)
    }

    /// Number of events waiting for the running rescan to finish.
    pub fn pending_len(&self) -> usize {
        self.pending.lock().len()
    }

    /// Replace the live counts with previously persisted ones.
    pub fn restore<I>(&self, groups: I)
    where
        I: IntoIterator<Item = (TagGroupId, Vec<TagCount>)>,
    {
        let table = CountTable::from_counts(groups);
        let _gate = self.transition.write();
        *self.live.write() = table;
        self.bump_version();
    }

    /// Rebuild all counts from `source`.
    ///
    /// Only one rescan runs at a time; a request made while one is running
    /// returns `AlreadyRunning` immediately. The source is walked without
    /// blocking `apply_event`. If the source fails, the live counts are kept,
    /// queued events are still replayed and the error is returned.
    pub fn rescan(&self, source: &dyn TagValueSource) -> Result<RescanOutcome> {
        {
            let _gate = self.transition.write();
            if self
                .rescanning
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                debug!("Rescan tag count already processing");
                return Ok(RescanOutcome::AlreadyRunning);
            }
        }

        let guard = RescanGuard {
            aggregator: self,
            finished: false,
        };
        info!("Rescan tag count start");

        let mut table = CountTable::default();
        let mut scanned = 0u64;
        for page in source.pages() {
            let page = page.inspect_err(|e| warn!(error = %e, "Rescan tag count failed"))?;
            for value in page {
                table.increment(value.tagged_value());
                scanned += 1;
            }
        }

        let replayed = guard.finish(table);
        info!(scanned, replayed, "Rescan tag count finished");
        Ok(RescanOutcome::Completed { scanned, replayed })
    }

    fn process(&self, event: &StorageLifecycleEvent) -> EventDisposition {
        if !event.carries_delta() {
            return EventDisposition::Ignored;
        }
        match event.kind {
            StorageEventKind::Create => {
                for value in &event.tagged_values {
                    if !self.live.read().try_increment(*value) {
                        self.live.write().increment(*value);
                    }
                }
            }
            StorageEventKind::Delete => {
                let live = self.live.read();
                for value in &event.tagged_values {
                    live.decrement(*value);
                }
            }
            StorageEventKind::Update => return EventDisposition::Ignored,
        }
        self.bump_version();
        EventDisposition::Applied
    }

    /// Swap in `fresh` (if any), replay the queue and clear the flag,
    /// all under one exclusive transition.
    fn end_rescan(&self, fresh: Option<CountTable>) -> usize {
        let _gate = self.transition.write();
        if let Some(table) = fresh {
            *self.live.write() = table;
            self.bump_version();
        }
        let queued: Vec<StorageLifecycleEvent> = self.pending.lock().drain(..).collect();
        for event in &queued {
            self.process(event);
        }
        self.rescanning.store(false, Ordering::Release);
        queued.len()
    }

    fn bump_version(&self) {
        self.version.fetch_add(1, Ordering::AcqRel);
    }
}

impl Default for TagCountAggregator {
    fn default() -> Self {
        Self::new()
    }
}

/// Ends a rescan on every exit path, so a failing source never leaves the
/// aggregator stuck in the rescanning state.
struct RescanGuard<'a> {
    aggregator: &'a TagCountAggregator,
    finished: bool,
}

impl RescanGuard<'_> {
    fn finish(mut self, table: CountTable) -> usize {
        self.finished = true;
        self.aggregator.end_rescan(Some(table))
    }
}

impl Drop for RescanGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            let replayed = self.aggregator.end_rescan(None);
            debug!(replayed, "Rescan tag count aborted, pending events replayed");
        }
    }
}
