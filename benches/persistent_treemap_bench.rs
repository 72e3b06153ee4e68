//! Benchmark for `PersistentTreeMap` vs standard `BTreeMap`.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::collections::BTreeMap;
use std::hint::black_box;
use strata::persistent::PersistentTreeMap;

// =============================================================================
// insert Benchmark
// =============================================================================

fn benchmark_insert(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("treemap_insert");

    for size in [100, 1000, 10000] {
        group.bench_with_input(
            BenchmarkId::new("PersistentTreeMap", size),
            &size,
            |bencher, &size| {
                bencher.iter(|| {
                    let mut map = PersistentTreeMap::new();
                    for key in 0..size {
                        map = map.insert(black_box(key), key);
                    }
                    black_box(map)
                });
            },
        );

        group.bench_with_input(BenchmarkId::new("BTreeMap", size), &size, |bencher, &size| {
            bencher.iter(|| {
                let mut map = BTreeMap::new();
                for key in 0..size {
                    map.insert(black_box(key), key);
                }
                black_box(map)
            });
        });
    }

    group.finish();
}

// =============================================================================
// get / remove Benchmarks
// =============================================================================

fn benchmark_get(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("treemap_get");

    for size in [100, 1000, 10000] {
        let map: PersistentTreeMap<i32, i32> = (0..size).map(|key| (key, key)).collect();
        group.bench_with_input(
            BenchmarkId::new("PersistentTreeMap", size),
            &size,
            |bencher, &size| {
                bencher.iter(|| {
                    let mut sum = 0;
                    for key in 0..size {
                        sum += map.get(&black_box(key)).copied().unwrap_or(0);
                    }
                    black_box(sum)
                });
            },
        );
    }

    group.finish();
}

fn benchmark_remove(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("treemap_remove");

    for size in [1000, 10000] {
        let map: PersistentTreeMap<i32, i32> = (0..size).map(|key| (key, key)).collect();
        group.bench_with_input(
            BenchmarkId::new("PersistentTreeMap", size),
            &size,
            |bencher, &size| {
                bencher.iter(|| {
                    let mut current = map.clone();
                    for key in 0..size {
                        current = current.remove(&key);
                    }
                    black_box(current)
                });
            },
        );
    }

    group.finish();
}

// =============================================================================
// range / seq Benchmarks
// =============================================================================

fn benchmark_range(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("treemap_range");
    let map: PersistentTreeMap<i32, i32> = (0..10000).map(|key| (key, key)).collect();

    group.bench_function("range_iter", |bencher| {
        bencher.iter(|| black_box(map.range(2500..7500).count()));
    });
    group.bench_function("subseq", |bencher| {
        bencher.iter(|| {
            let seq = map.subseq(2500..7500);
            black_box(seq.map_or(0, |seq| strata::protocol::count_seq(&seq)))
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_insert,
    benchmark_get,
    benchmark_remove,
    benchmark_range
);

criterion_main!(benches);
