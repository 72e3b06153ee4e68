//! Benchmark for `PersistentHashMap` vs standard `HashMap`.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::collections::HashMap;
use std::hint::black_box;
use strata::persistent::{ARRAY_MAP_THRESHOLD, PersistentHashMap};

// =============================================================================
// insert Benchmark
// =============================================================================

fn benchmark_insert(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("hashmap_insert");

    for size in [ARRAY_MAP_THRESHOLD, 1000, 10000] {
        group.bench_with_input(
            BenchmarkId::new("PersistentHashMap", size),
            &size,
            |bencher, &size| {
                bencher.iter(|| {
                    let mut map = PersistentHashMap::new();
                    for key in 0..size {
                        map = map.insert(black_box(key), key);
                    }
                    black_box(map)
                });
            },
        );

        group.bench_with_input(BenchmarkId::new("HashMap", size), &size, |bencher, &size| {
            bencher.iter(|| {
                let mut map = HashMap::new();
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
// get Benchmark
// =============================================================================

fn benchmark_get(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("hashmap_get");

    for size in [ARRAY_MAP_THRESHOLD, 1000, 10000] {
        let map: PersistentHashMap<usize, usize> = (0..size).map(|key| (key, key)).collect();
        group.bench_with_input(
            BenchmarkId::new("PersistentHashMap", size),
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

// =============================================================================
// remove Benchmark
// =============================================================================

fn benchmark_remove(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("hashmap_remove");

    for size in [1000, 10000] {
        let map: PersistentHashMap<usize, usize> = (0..size).map(|key| (key, key)).collect();
        group.bench_with_input(
            BenchmarkId::new("PersistentHashMap", size),
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

criterion_group!(benches, benchmark_insert, benchmark_get, benchmark_remove);

criterion_main!(benches);
