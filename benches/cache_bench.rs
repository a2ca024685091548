//! Criterion benchmarks for the increment hot path

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use tempfile::TempDir;
use usage_meter::services::{flush, AggregationCache, FileStatsStore};
use usage_meter::types::{DayKey, IncrementDelta};

fn delta() -> IncrementDelta {
    IncrementDelta {
        time_ms: 1500,
        user_messages: 1,
        user_words: 18,
        ..Default::default()
    }
}

fn bench_apply_increment(c: &mut Criterion) {
    let temp = TempDir::new().unwrap();
    let cache = AggregationCache::new(Box::new(FileStatsStore::new(temp.path())));
    let key = DayKey::current();

    let mut group = c.benchmark_group("apply_increment");
    for entities in [1usize, 100, 10_000] {
        let ids: Vec<String> = (0..entities).map(|i| format!("char-{}", i)).collect();
        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::from_parameter(entities), &ids, |b, ids| {
            let mut i = 0usize;
            b.iter(|| {
                cache.apply_increment(key, black_box(&ids[i % ids.len()]), &delta());
                i += 1;
            });
        });
    }
    group.finish();
}

fn bench_flush_day(c: &mut Criterion) {
    let temp = TempDir::new().unwrap();
    let cache = AggregationCache::new(Box::new(FileStatsStore::new(temp.path())));
    let key = DayKey::current();
    for i in 0..1_000 {
        cache.apply_increment(key, &format!("char-{}", i), &delta());
    }

    c.bench_function("flush_1000_entities", |b| {
        b.iter(|| {
            cache.apply_increment(key, "char-0", &delta());
            black_box(flush(&cache, true));
        });
    });
}

criterion_group!(benches, bench_apply_increment, bench_flush_day);
criterion_main!(benches);
