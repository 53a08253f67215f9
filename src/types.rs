//! Core types for tag statistics.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Identifier of a tag group (the category a tag belongs to).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TagGroupId(pub u64);

impl fmt::Debug for TagGroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TagGroupId({})", self.0)
    }
}

impl fmt::Display for TagGroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a single tag.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TagId(pub u64);

impl fmt::Debug for TagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TagId({})", self.0)
    }
}

impl fmt::Display for TagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a stored file or folder.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StorageId(pub u64);

impl fmt::Debug for StorageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StorageId({})", self.0)
    }
}

/// Association of a storage item with a (group, tag) pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaggedValue {
    pub group_id: TagGroupId,
    pub tag_id: TagId,
}

impl TaggedValue {
    pub fn new(group_id: u64, tag_id: u64) -> Self {
        Self {
            group_id: TagGroupId(group_id),
            tag_id: TagId(tag_id),
        }
    }
}

/// Kind of storage lifecycle change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageEventKind {
    Create,
    Delete,
    Update,
}

/// A storage lifecycle change, as delivered by the host.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageLifecycleEvent {
    pub kind: StorageEventKind,
    pub storage: StorageId,
    /// Size of the storage item in bytes.
    pub size: u64,
    pub tagged_values: Vec<TaggedValue>,
}

impl StorageLifecycleEvent {
    pub fn new(kind: StorageEventKind, storage: StorageId, tagged_values: Vec<TaggedValue>) -> Self {
        Self {
            kind,
            storage,
            size: 0,
            tagged_values,
        }
    }

    pub fn create(storage: StorageId, tagged_values: Vec<TaggedValue>) -> Self {
        Self::new(StorageEventKind::Create, storage, tagged_values)
    }

    pub fn delete(storage: StorageId, tagged_values: Vec<TaggedValue>) -> Self {
        Self::new(StorageEventKind::Delete, storage, tagged_values)
    }

    pub fn update(storage: StorageId, tagged_values: Vec<TaggedValue>) -> Self {
        Self::new(StorageEventKind::Update, storage, tagged_values)
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }

    /// Whether applying this event can change any count.
    pub fn carries_delta(&self) -> bool {
        !self.tagged_values.is_empty()
            && matches!(self.kind, StorageEventKind::Create | StorageEventKind::Delete)
    }
}

/// A point-in-time count for one tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TagCount {
    pub tag_id: TagId,
    pub count: u64,
}

impl TagCount {
    pub fn new(tag_id: u64, count: u64) -> Self {
        Self {
            tag_id: TagId(tag_id),
            count,
        }
    }
}

/// Version of the statistics, bumped on every applied mutation.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct StatisticsVersion(pub u64);

impl fmt::Debug for StatisticsVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Version({})", self.0)
    }
}

impl StatisticsVersion {
    pub fn next(self) -> Self {
        StatisticsVersion(self.0 + 1)
    }
}

/// Immutable copy of every group's tag counts.
///
/// Groups are ordered by id; tags within a group keep first-seen order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagCountSnapshot {
    pub groups: BTreeMap<TagGroupId, Vec<TagCount>>,
}

impl TagCountSnapshot {
    /// Count for a (group, tag) pair, if the pair is tracked.
    pub fn count(&self, group_id: TagGroupId, tag_id: TagId) -> Option<u64> {
        self.groups
            .get(&group_id)?
            .iter()
            .find(|c| c.tag_id == tag_id)
            .map(|c| c.count)
    }

    pub fn group(&self, group_id: TagGroupId) -> &[TagCount] {
        self.groups.get(&group_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Raw persisted statistics: statistic field name to flat string value.
pub type RawStatistics = BTreeMap<String, String>;
