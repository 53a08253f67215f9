//! Authoritative sources of tagged storage values, walked during a rescan.

use crate::error::Result;
use crate::types::{StorageId, TagGroupId, TagId, TaggedValue};
use serde::{Deserialize, Serialize};

/// Default page size for in-memory sources.
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// One persisted (storage item, group, tag) association.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StorageTagValue {
    pub storage: StorageId,
    pub group_id: TagGroupId,
    pub tag_id: TagId,
}

impl StorageTagValue {
    pub fn new(storage: u64, group_id: u64, tag_id: u64) -> Self {
        Self {
            storage: StorageId(storage),
            group_id: TagGroupId(group_id),
            tag_id: TagId(tag_id),
        }
    }

    pub fn tagged_value(&self) -> TaggedValue {
        TaggedValue {
            group_id: self.group_id,
            tag_id: self.tag_id,
        }
    }
}

/// A paged walk over every currently tagged storage item.
///
/// Each call to `pages` starts a fresh traversal. The walk may block on I/O;
/// an `Err` page aborts the rescan consuming it.
pub trait TagValueSource: Send + Sync {
    fn pages(&self) -> Box<dyn Iterator<Item = Result<Vec<StorageTagValue>>> + '_>;
}

/// In-memory source that pages over a fixed list of values.
#[derive(Clone, Debug)]
pub struct VecTagValueSource {
    values: Vec<StorageTagValue>,
    page_size: usize,
}

impl VecTagValueSource {
    pub fn new(values: Vec<StorageTagValue>) -> Self {
        Self::with_page_size(values, DEFAULT_PAGE_SIZE)
    }

    pub fn with_page_size(values: Vec<StorageTagValue>, page_size: usize) -> Self {
        Self {
            values,
            page_size: page_size.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Default for VecTagValueSource {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl TagValueSource for VecTagValueSource {
    fn pages(&self) -> Box<dyn Iterator<Item = Result<Vec<StorageTagValue>>> + '_> {
        Box::new(self.values.chunks(self.page_size).map(|page| Ok(page.to_vec())))
    }
}
