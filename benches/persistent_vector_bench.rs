//! Benchmark for `PersistentVector` vs standard `Vec`.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use strata::persistent::PersistentVector;
use strata::protocol::Reducible;

// =============================================================================
// conj Benchmark
// =============================================================================

fn benchmark_conj(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("conj");

    for size in [100, 1000, 10000] {
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

        group.bench_with_input(BenchmarkId::new("Vec", size), &size, |bencher, &size| {
            bencher.iter(|| {
                let mut vector = Vec::new();
                for index in 0..size {
                    vector.push(black_box(index));
                }
                black_box(vector)
            });
        });
    }

    group.finish();
}

// =============================================================================
// get Benchmark
// =============================================================================

fn benchmark_get(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("get");

    for size in [100, 1000, 10000] {
        let vector: PersistentVector<usize> = (0..size).collect();
        group.bench_with_input(
            BenchmarkId::new("PersistentVector", size),
            &size,
            |bencher, &size| {
                bencher.iter(|| {
                    let mut sum = 0;
                    for index in 0..size {
                        sum += vector.get(black_box(index)).copied().unwrap_or(0);
                    }
                    black_box(sum)
                });
            },
        );
    }

    group.finish();
}

// =============================================================================
// assoc_n / pop Benchmarks
// =============================================================================

fn benchmark_assoc_n(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("assoc_n");

    for size in [100, 1000, 10000] {
        let vector: PersistentVector<usize> = (0..size).collect();
        group.bench_with_input(
            BenchmarkId::new("PersistentVector", size),
            &size,
            |bencher, &size| {
                bencher.iter(|| black_box(vector.assoc_n(black_box(size / 2), 0)));
            },
        );
    }

    group.finish();
}

fn benchmark_pop(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("pop");

    for size in [1000, 10000] {
        let vector: PersistentVector<usize> = (0..size).collect();
        group.bench_with_input(
            BenchmarkId::new("PersistentVector", size),
            &size,
            |bencher, _| {
                bencher.iter(|| {
                    let mut current = vector.clone();
                    while let Ok(next) = current.pop() {
                        current = next;
                    }
                    black_box(current)
                });
            },
        );
    }

    group.finish();
}

// =============================================================================
// Traversal Benchmark
// =============================================================================

fn benchmark_traversal(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("traversal");
    let vector: PersistentVector<u64> = (0..100_000).collect();

    group.bench_function("iter", |bencher| {
        bencher.iter(|| black_box(vector.iter().sum::<u64>()));
    });
    group.bench_function("reduce", |bencher| {
        bencher.iter(|| black_box(vector.fold(0, |sum, value| sum + value)));
    });
    group.bench_function("seq_reduce", |bencher| {
        bencher.iter(|| {
            let seq = vector.seq();
            black_box(seq.map_or(0, |seq| seq.fold(0, |sum, value| sum + value)))
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_conj,
    benchmark_get,
    benchmark_assoc_n,
    benchmark_pop,
    benchmark_traversal
);

criterion_main!(benches);
