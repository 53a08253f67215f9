//! Aggregator behavior under rescans and concurrent event delivery.

use crossbeam_channel::{unbounded, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tagstats::{
    EventDisposition, RescanOutcome, Result, StatisticsVersion, StorageId, StorageLifecycleEvent,
    StorageTagValue, TagCount, TagCountAggregator, TagGroupId, TagId, TagValueSource, TaggedValue,
    VecTagValueSource,
};

/// Source whose pages arrive over a channel; the walk blocks until the
/// sender is dropped.
struct ChannelSource {
    pages: Receiver<Vec<StorageTagValue>>,
}

impl TagValueSource for ChannelSource {
    fn pages(&self) -> Box<dyn Iterator<Item = Result<Vec<StorageTagValue>>> + '_> {
        Box::new(self.pages.iter().map(Ok))
    }
}

fn gated_source() -> (Sender<Vec<StorageTagValue>>, ChannelSource) {
    let (tx, rx) = unbounded();
    (tx, ChannelSource { pages: rx })
}

fn create(group: u64, tag: u64) -> StorageLifecycleEvent {
    StorageLifecycleEvent::create(StorageId(1), vec![TaggedValue::new(group, tag)])
}

fn delete(group: u64, tag: u64) -> StorageLifecycleEvent {
    StorageLifecycleEvent::delete(StorageId(1), vec![TaggedValue::new(group, tag)])
}

fn wait_until(condition: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "Timed out waiting for condition");
        thread::sleep(Duration::from_millis(1));
    }
}

/// Start a rescan on another thread and wait until it holds the flag.
fn start_blocked_rescan(
    aggregator: &Arc<TagCountAggregator>,
    source: ChannelSource,
) -> thread::JoinHandle<Result<RescanOutcome>> {
    let handle = {
        let aggregator = Arc::clone(aggregator);
        thread::spawn(move || aggregator.rescan(&source))
    };
    wait_until(|| aggregator.is_rescanning());
    handle
}

// --- Incremental Counting ---

#[test]
fn test_create_delete_then_rescan() {
    let aggregator = TagCountAggregator::new();

    aggregator.apply_event(create(1, 10));
    assert_eq!(aggregator.count(TagGroupId(1), TagId(10)), Some(1));

    aggregator.apply_event(delete(1, 10));
    assert_eq!(aggregator.count(TagGroupId(1), TagId(10)), Some(0));

    let before = aggregator.version();
    let source = VecTagValueSource::new(vec![
        StorageTagValue::new(1, 1, 10),
        StorageTagValue::new(2, 1, 10),
    ]);
    aggregator.rescan(&source).unwrap();

    assert_eq!(aggregator.count(TagGroupId(1), TagId(10)), Some(2));
    assert_eq!(aggregator.version(), before.next());
}

#[test]
fn test_multi_valued_events() {
    let aggregator = TagCountAggregator::new();
    let tagged = vec![
        TaggedValue::new(1, 10),
        TaggedValue::new(1, 11),
        TaggedValue::new(2, 20),
    ];

    aggregator.apply_event(StorageLifecycleEvent::create(StorageId(1), tagged.clone()));
    aggregator.apply_event(StorageLifecycleEvent::create(StorageId(2), tagged.clone()));
    aggregator.apply_event(StorageLifecycleEvent::delete(StorageId(1), vec![tagged[1]]));

    let snapshot = aggregator.snapshot();
    assert_eq!(
        snapshot.group(TagGroupId(1)),
        &[TagCount::new(10, 2), TagCount::new(11, 1)]
    );
    assert_eq!(snapshot.count(TagGroupId(2), TagId(20)), Some(2));
    // One version bump per applied event.
    assert_eq!(aggregator.version(), StatisticsVersion(3));
}

#[test]
fn test_snapshot_is_detached() {
    let aggregator = TagCountAggregator::new();
    aggregator.apply_event(create(1, 10));

    let snapshot = aggregator.snapshot();
    aggregator.apply_event(create(1, 10));

    assert_eq!(snapshot.count(TagGroupId(1), TagId(10)), Some(1));
    assert_eq!(aggregator.count(TagGroupId(1), TagId(10)), Some(2));
}

#[test]
fn test_concurrent_creates_do_not_lose_counts() {
    let aggregator = Arc::new(TagCountAggregator::new());

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let aggregator = Arc::clone(&aggregator);
            thread::spawn(move || {
                for i in 0..500 {
                    aggregator.apply_event(create(1, (t + i) % 4));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let total: u64 = aggregator
        .snapshot()
        .group(TagGroupId(1))
        .iter()
        .map(|c| c.count)
        .sum();
    assert_eq!(total, 8 * 500);
    assert_eq!(aggregator.version(), StatisticsVersion(8 * 500));
}

// --- Rescan Queueing ---

#[test]
fn test_event_during_rescan_is_replayed() {
    let aggregator = Arc::new(TagCountAggregator::new());
    let (tx, source) = gated_source();
    let rescan = start_blocked_rescan(&aggregator, source);

    assert_eq!(aggregator.apply_event(create(2, 20)), EventDisposition::Queued);
    assert_eq!(aggregator.pending_len(), 1);
    // Not applied yet.
    assert_eq!(aggregator.count(TagGroupId(2), TagId(20)), None);

    tx.send(vec![StorageTagValue::new(1, 1, 10)]).unwrap();
    drop(tx);

    let outcome = rescan.join().unwrap().unwrap();
    assert_eq!(outcome, RescanOutcome::Completed { scanned: 1, replayed: 1 });
    assert_eq!(aggregator.count(TagGroupId(2), TagId(20)), Some(1));
    assert_eq!(aggregator.count(TagGroupId(1), TagId(10)), Some(1));
    assert_eq!(aggregator.pending_len(), 0);
    assert!(!aggregator.is_rescanning());
}

#[test]
fn test_queued_events_replay_in_arrival_order() {
    let aggregator = Arc::new(TagCountAggregator::new());
    let (tx, source) = gated_source();
    let rescan = start_blocked_rescan(&aggregator, source);

    // Counts saturate at zero, so the order of these events is observable.
    aggregator.apply_event(create(1, 10));
    aggregator.apply_event(delete(1, 10));
    aggregator.apply_event(delete(1, 10));
    aggregator.apply_event(create(1, 10));

    tx.send(vec![StorageTagValue::new(1, 1, 10)]).unwrap();
    drop(tx);
    rescan.join().unwrap().unwrap();

    // 1 from the rescan, then +1 -1 -1 +1.
    assert_eq!(aggregator.count(TagGroupId(1), TagId(10)), Some(1));
}

#[test]
fn test_replay_matches_rescan_then_apply() {
    let values = vec![StorageTagValue::new(1, 1, 10), StorageTagValue::new(2, 3, 30)];
    let events = vec![create(1, 10), create(4, 40), delete(3, 30)];

    // Rescan first, then apply.
    let expected = TagCountAggregator::new();
    expected.rescan(&VecTagValueSource::new(values.clone())).unwrap();
    for event in events.clone() {
        expected.apply_event(event);
    }

    // Apply while rescanning.
    let aggregator = Arc::new(TagCountAggregator::new());
    let (tx, source) = gated_source();
    let rescan = start_blocked_rescan(&aggregator, source);
    for event in events {
        assert_eq!(aggregator.apply_event(event), EventDisposition::Queued);
    }
    tx.send(values).unwrap();
    drop(tx);
    rescan.join().unwrap().unwrap();

    assert_eq!(aggregator.snapshot(), expected.snapshot());
}

#[test]
fn test_concurrent_rescans_are_single_flight() {
    let aggregator = Arc::new(TagCountAggregator::new());
    let before = aggregator.version();
    let (tx, source) = gated_source();
    let rescan = start_blocked_rescan(&aggregator, source);

    let others: Vec<_> = (0..8)
        .map(|_| {
            let aggregator = Arc::clone(&aggregator);
            thread::spawn(move || {
                let source = VecTagValueSource::new(vec![StorageTagValue::new(9, 9, 90)]);
                aggregator.rescan(&source).unwrap()
            })
        })
        .collect();
    for other in others {
        assert_eq!(other.join().unwrap(), RescanOutcome::AlreadyRunning);
    }

    drop(tx);
    let outcome = rescan.join().unwrap().unwrap();
    assert!(matches!(outcome, RescanOutcome::Completed { .. }));
    assert_eq!(aggregator.version(), before.next());
    assert_eq!(aggregator.count(TagGroupId(9), TagId(90)), None);
}

#[test]
fn test_snapshot_readable_during_rescan() {
    let aggregator = Arc::new(TagCountAggregator::new());
    aggregator.apply_event(create(1, 10));

    let (tx, source) = gated_source();
    let rescan = start_blocked_rescan(&aggregator, source);

    // Readers see the old counts until the swap.
    assert_eq!(aggregator.snapshot().count(TagGroupId(1), TagId(10)), Some(1));

    tx.send(vec![StorageTagValue::new(1, 5, 50)]).unwrap();
    drop(tx);
    rescan.join().unwrap().unwrap();

    let snapshot = aggregator.snapshot();
    assert_eq!(snapshot.count(TagGroupId(1), TagId(10)), None);
    assert_eq!(snapshot.count(TagGroupId(5), TagId(50)), Some(1));
}
