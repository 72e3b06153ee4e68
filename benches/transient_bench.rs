//! Benchmark for transient batch construction.
//!
//! Compares building through a transient against repeated persistent
//! updates for the vector, hash map and hash set.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use strata::persistent::{
    PersistentHashMap, PersistentHashSet, PersistentVector, TransientHashMap, TransientHashSet,
    TransientVector,
};

// =============================================================================
// TransientVector Benchmarks
// =============================================================================

fn benchmark_vector_build(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("vector_build");

    for size in [1_000, 10_000, 100_000] {
        group.bench_with_input(
            BenchmarkId::new("TransientVector", size),
            &size,
            |bencher, &size| {
                bencher.iter(|| {
                    let mut transient = TransientVector::new();
                    for index in 0..size {
                        transient.conj(black_box(index));
                    }
                    black_box(transient.persistent())
                });
            },
        );

        group.bench_with_input(
            BenchmarkId::new("PersistentVector", size),
            &size,
            |bencher, &size| {
                bencher.iter(|| {
                    let mut vector = PersistentVector::new();
                    for index in 0..size {
                        vector = vector.conj(black_box(index));
                    }
                    black_box(vector)
                });
            },
        );
    }

    group.finish();
}

// =============================================================================
// TransientHashMap Benchmarks
// =============================================================================

fn benchmark_hashmap_build(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("hashmap_build");

    for size in [1_000, 10_000, 100_000] {
        group.bench_with_input(
            BenchmarkId::new("TransientHashMap", size),
            &size,
            |bencher, &size| {
                bencher.iter(|| {
                    let mut transient = TransientHashMap::new();
                    for key in 0..size {
                        transient.insert(black_box(key), key);
                    }
                    black_box(transient.persistent())
                });
            },
        );

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
    }

    group.finish();
}

// =============================================================================
// TransientHashSet Benchmarks
// =============================================================================

fn benchmark_hashset_build(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("hashset_build");

    for size in [1_000, 10_000] {
        group.bench_with_input(
            BenchmarkId::new("TransientHashSet", size),
            &size,
            |bencher, &size| {
                bencher.iter(|| {
                    let mut transient = TransientHashSet::new();
                    for element in 0..size {
                        transient.insert(black_box(element));
                    }
                    black_box(transient.persistent())
                });
            },
        );

        group.bench_with_input(
            BenchmarkId::new("PersistentHashSet", size),
            &size,
            |bencher, &size| {
                bencher.iter(|| {
                    let mut set = PersistentHashSet::new();
                    for element in 0..size {
                        set = set.insert(black_box(element));
                    }
                    black_box(set)
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_vector_build,
    benchmark_hashmap_build,
    benchmark_hashset_build
);

criterion_main!(benches);
