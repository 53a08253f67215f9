//! Performance benchmarks for tag statistics.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tagstats::{
    deserialize_counts, serialize_counts, StorageId, StorageLifecycleEvent, StorageTagValue,
    TagCount, TagCountAggregator, TaggedValue, VecTagValueSource,
};

/// Benchmark incremental event application on an existing tag.
fn bench_apply_event(c: &mut Criterion) {
    let aggregator = TagCountAggregator::new();
    let event = StorageLifecycleEvent::create(StorageId(1), vec![TaggedValue::new(1, 10)]);

    c.bench_function("apply_create_existing_tag", |b| {
        b.iter(|| black_box(aggregator.apply_event(event.clone())));
    });
}

/// Benchmark a full rescan with varying numbers of tagged values
fn bench_rescan(c: &mut Criterion) {
    let mut group = c.benchmark_group("rescan");

    for size in [1_000u64, 10_000, 100_000] {
        let values = (0..size)
            .map(|i| StorageTagValue::new(i, i % 16, i % 256))
            .collect();
        let source = VecTagValueSource::new(values);

        group.bench_with_input(BenchmarkId::new("tagged_values", size), &source, |b, source| {
            let aggregator = TagCountAggregator::new();
            b.iter(|| black_box(aggregator.rescan(source).unwrap()));
        });
    }

    group.finish();
}

/// Benchmark snapshot copies
fn bench_snapshot(c: &mut Criterion) {
    let aggregator = TagCountAggregator::new();
    for group in 0..32 {
        for tag in 0..64 {
            aggregator.apply_event(StorageLifecycleEvent::create(
                StorageId(1),
                vec![TaggedValue::new(group, group * 100 + tag)],
            ));
        }
    }

    c.bench_function("snapshot_32x64", |b| {
        b.iter(|| black_box(aggregator.snapshot()));
    });
}

/// Benchmark counter serialization both ways
fn bench_codec(c: &mut Criterion) {
    let counts: Vec<TagCount> = (0..256).map(|i| TagCount::new(i, i * 7)).collect();
    let encoded = serialize_counts(&counts);

    c.bench_function("serialize_256", |b| {
        b.iter(|| black_box(serialize_counts(&counts)));
    });
    c.bench_function("deserialize_256", |b| {
        b.iter(|| black_box(deserialize_counts(&encoded)));
    });
}

criterion_group!(benches, bench_apply_event, bench_rescan, bench_snapshot, bench_codec);
criterion_main!(benches);
