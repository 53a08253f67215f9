//! Display views of tag counts.
//!
//! Raw counters only carry ids. Building a report resolves names through a
//! [`TagLookup`]; groups or tags that no longer exist are left out.

use crate::counts::decode_raw;
use crate::types::{RawStatistics, TagGroupId, TagId};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Display metadata for a tag group.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagGroupInfo {
    pub id: TagGroupId,
    pub name: String,
}

/// Display metadata for a tag.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagInfo {
    pub id: TagId,
    pub name: String,
}

/// Resolves tag and group ids to display metadata.
///
/// Ids without metadata are simply absent from the returned lists.
pub trait TagLookup: Send + Sync {
    fn tag_groups(&self, ids: &[TagGroupId]) -> Vec<TagGroupInfo>;

    fn tags(&self, ids: &[TagId]) -> Vec<TagInfo>;
}

/// Counted tag with its name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagValueCount {
    pub id: TagId,
    pub name: String,
    pub count: u64,
}

/// Counted tags of one group, with the group's name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagGroupValueCount {
    pub id: TagGroupId,
    pub name: String,
    pub counts: Vec<TagValueCount>,
}

/// Resolve raw counters into named group/tag counts keyed by group id.
pub fn build_report(
    raw: &RawStatistics,
    lookup: &dyn TagLookup,
) -> BTreeMap<String, TagGroupValueCount> {
    let decoded = decode_raw(raw);

    let group_ids: Vec<TagGroupId> = decoded.keys().copied().collect();
    let tag_ids: Vec<TagId> = decoded
        .values()
        .flatten()
        .map(|c| c.tag_id)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let groups: HashMap<TagGroupId, TagGroupInfo> = lookup
        .tag_groups(&group_ids)
        .into_iter()
        .map(|info| (info.id, info))
        .collect();
    let tags: HashMap<TagId, TagInfo> = lookup
        .tags(&tag_ids)
        .into_iter()
        .map(|info| (info.id, info))
        .collect();

    let mut report = BTreeMap::new();
    for (group_id, counts) in decoded {
        let Some(group) = groups.get(&group_id) else {
            continue;
        };
        let counts = counts
            .iter()
            .filter_map(|count| {
                tags.get(&count.tag_id).map(|tag| TagValueCount {
                    id: tag.id,
                    name: tag.name.clone(),
                    count: count.count,
                })
            })
            .collect();
        report.insert(
            group_id.to_string(),
            TagGroupValueCount {
                id: group.id,
                name: group.name.clone(),
                counts,
            },
        );
    }
    report
}

#[derive(Default)]
struct DirectoryIndex {
    groups: HashMap<TagGroupId, String>,
    tags: HashMap<TagId, String>,
}

/// In-memory tag and group names.
#[derive(Default)]
pub struct TagDirectory {
    index: RwLock<DirectoryIndex>,
}

impl TagDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_group(&self, id: TagGroupId, name: impl Into<String>) {
        self.index.write().groups.insert(id, name.into());
    }

    pub fn insert_tag(&self, id: TagId, name: impl Into<String>) {
        self.index.write().tags.insert(id, name.into());
    }

    pub fn remove_group(&self, id: TagGroupId) -> bool {
        self.index.write().groups.remove(&id).is_some()
    }

    pub fn remove_tag(&self, id: TagId) -> bool {
        self.index.write().tags.remove(&id).is_some()
    }
}

impl TagLookup for TagDirectory {
    fn tag_groups(&self, ids: &[TagGroupId]) -> Vec<TagGroupInfo> {
        let index = self.index.read();
        ids.iter()
            .filter_map(|id| {
                index.groups.get(id).map(|name| TagGroupInfo {
                    id: *id,
                    name: name.clone(),
                })
            })
            .collect()
    }

    fn tags(&self, ids: &[TagId]) -> Vec<TagInfo> {
        let index = self.index.read();
        ids.iter()
            .filter_map(|id| {
                index.tags.get(id).map(|name| TagInfo {
                    id: *id,
                    name: name.clone(),
                })
            })
            .collect()
    }
}
