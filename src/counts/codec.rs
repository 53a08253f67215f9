//! Flat string codec for persisted tag counters.
//!
//! Each group's counters are stored as `tagId:count,` pairs, every pair
//! terminated by a comma. Raw statistics map the decimal group id to that
//! string.

use crate::types::{RawStatistics, TagCount, TagCountSnapshot, TagGroupId, TagId};
use std::collections::BTreeMap;
use std::fmt::Write;
use tracing::debug;

/// Encode a group's counters.
pub fn serialize_counts(counts: &[TagCount]) -> String {
    let mut out = String::with_capacity(counts.len() * 8);
    for count in counts {
        // Writing into a String cannot fail.
        let _ = write!(out, "{}:{},", count.tag_id.0, count.count);
    }
    out
}

/// Decode a group's counters, skipping malformed pairs.
pub fn deserialize_counts(raw: &str) -> Vec<TagCount> {
    let mut counts = Vec::new();
    for entry in raw.split(',') {
        if entry.is_empty() {
            continue;
        }
        let parts: Vec<&str> = entry.split(':').collect();
        if parts.len() != 2 {
            debug!(entry, "Skipping malformed tag counter");
            continue;
        }
        match (parts[0].trim().parse::<u64>(), parts[1].trim().parse::<u64>()) {
            (Ok(tag_id), Ok(count)) => counts.push(TagCount {
                tag_id: TagId(tag_id),
                count,
            }),
            _ => debug!(entry, "Skipping unparsable tag counter"),
        }
    }
    counts
}

/// Encode a snapshot into raw statistics keyed by group id.
pub fn encode_snapshot(snapshot: &TagCountSnapshot) -> RawStatistics {
    snapshot
        .groups
        .iter()
        .map(|(group, counts)| (group.0.to_string(), serialize_counts(counts)))
        .collect()
}

/// Decode raw statistics back into per-group counters.
///
/// Keys that are not a group id are skipped. A group with an empty value
/// decodes to an empty list.
pub fn decode_raw(raw: &RawStatistics) -> BTreeMap<TagGroupId, Vec<TagCount>> {
    let mut groups = BTreeMap::new();
    for (key, value) in raw {
        let Ok(group) = key.trim().parse::<u64>() else {
            debug!(key = key.as_str(), "Skipping non-numeric tag group key");
            continue;
        };
        groups.insert(TagGroupId(group), deserialize_counts(value));
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialize_format() {
        let counts = vec![TagCount::new(10, 3), TagCount::new(11, 0)];
        assert_eq!(serialize_counts(&counts), "10:3,11:0,");
    }

    #[test]
    fn test_empty_inputs() {
        assert_eq!(serialize_counts(&[]), "");
        assert!(deserialize_counts("").is_empty());
    }

    #[test]
    fn test_skips_malformed_pairs() {
        let counts = deserialize_counts("1:2,bad,3:4:5,x:1,6:7,,8:");
        assert_eq!(counts, vec![TagCount::new(1, 2), TagCount::new(6, 7)]);
    }

    #[test]
    fn test_accepts_missing_trailing_comma() {
        assert_eq!(
            deserialize_counts("5:1,6:2"),
            vec![TagCount::new(5, 1), TagCount::new(6, 2)]
        );
    }

    #[test]
    fn test_decode_raw_skips_bad_keys() {
        let mut raw = RawStatistics::new();
        raw.insert("1".into(), "10:2,".into());
        raw.insert("two".into(), "20:1,".into());
        raw.insert("3".into(), String::new());

        let decoded = decode_raw(&raw);
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[&TagGroupId(1)], vec![TagCount::new(10, 2)]);
        assert!(decoded[&TagGroupId(3)].is_empty());
    }
}
