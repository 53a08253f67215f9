//! Live count table with per-tag atomic counters.

use crate::types::{TagCount, TagCountSnapshot, TagGroupId, TagId, TaggedValue};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

struct TagCounter {
    tag_id: TagId,
    count: AtomicU64,
}

impl TagCounter {
    fn new(tag_id: TagId, count: u64) -> Self {
        Self {
            tag_id,
            count: AtomicU64::new(count),
        }
    }
}

/// Group id to per-tag counters.
///
/// Counters for existing tags can be bumped through a shared reference;
/// adding a new tag needs exclusive access.
#[derive(Default)]
pub(crate) struct CountTable {
    groups: HashMap<TagGroupId, Vec<TagCounter>>,
}

impl CountTable {
    pub(crate) fn from_counts<I>(groups: I) -> Self
    where
        I: IntoIterator<Item = (TagGroupId, Vec<TagCount>)>,
    {
        let mut table = Self::default();
        for (group, counts) in groups {
            let counters = table.groups.entry(group).or_default();
            for count in counts {
                match counters.iter().find(|c| c.tag_id == count.tag_id) {
                    Some(existing) => {
                        existing.count.fetch_add(count.count, Ordering::Relaxed);
                    }
                    None => counters.push(TagCounter::new(count.tag_id, count.count)),
                }
            }
        }
        table
    }

    /// Increment an already tracked pair. Returns false if the pair is untracked.
    pub(crate) fn try_increment(&self, value: TaggedValue) -> bool {
        match self.counter(value) {
            Some(counter) => {
                counter.count.fetch_add(1, Ordering::AcqRel);
                true
            }
            None => false,
        }
    }

    /// Increment a pair, starting it at one if untracked.
    pub(crate) fn increment(&mut self, value: TaggedValue) {
        if self.try_increment(value) {
            return;
        }
        self.groups
            .entry(value.group_id)
            .or_default()
            .push(TagCounter::new(value.tag_id, 1));
    }

    /// Decrement a tracked pair, never going below zero.
    ///
    /// Untracked pairs are ignored.
    pub(crate) fn decrement(&self, value: TaggedValue) {
        if let Some(counter) = self.counter(value) {
            let _ = counter
                .count
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| c.checked_sub(1));
        }
    }

    pub(crate) fn snapshot(&self) -> TagCountSnapshot {
        let groups = self
            .groups
            .iter()
            .map(|(group, counters)| {
                let counts = counters
                    .iter()
                    .map(|c| TagCount {
                        tag_id: c.tag_id,
                        count: c.count.load(Ordering::Acquire),
                    })
                    .collect();
                (*group, counts)
            })
            .collect();
        TagCountSnapshot { groups }
    }

    pub(crate) fn count(&self, group_id: TagGroupId, tag_id: TagId) -> Option<u64> {
        self.counter(TaggedValue { group_id, tag_id })
            .map(|c| c.count.load(Ordering::Acquire))
    }

    fn counter(&self, value: TaggedValue) -> Option<&TagCounter> {
        self.groups
            .get(&value.group_id)?
            .iter()
            .find(|c| c.tag_id == value.tag_id)
    }
}
