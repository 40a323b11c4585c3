//! Entity locker benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use entilock_bench::utils::{bench_locker, generate_batches, random_keys};
use entilock_core::KeyNormalizer;
use std::sync::Arc;
use std::thread;

/// Benchmark uncontended single-key operations.
fn bench_single_key(c: &mut Criterion) {
    let mut group = c.benchmark_group("single_key");

    group.bench_function("lock_unlock", |b| {
        let locker = bench_locker();
        b.iter(|| {
            locker.lock(black_box(7)).unwrap();
            locker.unlock(black_box(7)).unwrap();
        });
    });

    group.bench_function("try_lock_unlock", |b| {
        let locker = bench_locker();
        b.iter(|| {
            black_box(locker.try_lock_for(black_box(7), 10).unwrap());
            locker.unlock(7).unwrap();
        });
    });

    group.bench_function("guard", |b| {
        let locker = bench_locker();
        b.iter(|| {
            let guard = locker.guard(black_box(7)).unwrap();
            black_box(&guard);
        });
    });

    // Reentrant acquisition on an already-held key.
    group.bench_function("reentrant", |b| {
        let locker = bench_locker();
        locker.lock(7).unwrap();
        b.iter(|| {
            locker.lock(black_box(7)).unwrap();
            locker.unlock(black_box(7)).unwrap();
        });
        locker.unlock(7).unwrap();
    });

    group.finish();
}

/// Benchmark lock table growth with many live keys.
fn bench_table_size(c: &mut Criterion) {
    let mut group = c.benchmark_group("table_size");

    for held in [10u64, 1_000, 10_000] {
        group.bench_with_input(BenchmarkId::from_parameter(held), &held, |b, &held| {
            let locker = bench_locker();
            locker.lock_all(0..held).unwrap();
            let probe = held + 1;
            b.iter(|| {
                locker.lock(black_box(probe)).unwrap();
                locker.unlock(black_box(probe)).unwrap();
            });
            locker.unlock_all(0..held).unwrap();
        });
    }

    // Filling the table against key order inserts every key at the front.
    group.bench_function("fill_descending_10000", |b| {
        let locker = bench_locker();
        b.iter(|| {
            for key in (0..10_000u64).rev() {
                locker.lock(key).unwrap();
            }
            for key in 0..10_000u64 {
                locker.unlock(key).unwrap();
            }
        });
    });

    group.finish();
}

/// Benchmark multi-key batches.
fn bench_batches(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch");

    for size in [2usize, 8, 32] {
        group.throughput(Throughput::Elements(size as u64));

        group.bench_with_input(BenchmarkId::new("lock_all", size), &size, |b, &size| {
            let locker = bench_locker();
            let batches = generate_batches(64, size, 256);
            let mut next = 0;
            b.iter(|| {
                let batch = &batches[next % batches.len()];
                next += 1;
                locker.lock_all(batch.iter().copied()).unwrap();
                locker.unlock_all(batch.iter().copied()).unwrap();
            });
        });

        group.bench_with_input(BenchmarkId::new("try_lock_all", size), &size, |b, &size| {
            let locker = bench_locker();
            let batches = generate_batches(64, size, 256);
            let mut next = 0;
            b.iter(|| {
                let batch = &batches[next % batches.len()];
                next += 1;
                black_box(locker.try_lock_all_for(batch.iter().copied(), 10).unwrap());
                locker.unlock_all(batch.iter().copied()).unwrap();
            });
        });
    }

    group.finish();
}

/// Benchmark key normalization alone.
fn bench_normalize(c: &mut Criterion) {
    let mut group = c.benchmark_group("normalize");
    let normalizer = KeyNormalizer::new(Arc::clone(bench_locker().properties().key_order()));

    for count in [8usize, 64, 512] {
        let keys = random_keys(count, count as u64 / 2 + 1);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &keys, |b, keys| {
            b.iter(|| {
                let normalized = normalizer.normalize(black_box(keys).iter().copied());
                black_box(normalized);
            });
        });
    }

    group.finish();
}

/// Benchmark contended access from background threads.
fn bench_contended(c: &mut Criterion) {
    let mut group = c.benchmark_group("contended");
    group.sample_size(20);

    for threads in [2usize, 4, 8] {
        group.bench_with_input(BenchmarkId::from_parameter(threads), &threads, |b, &threads| {
            b.iter(|| {
                let locker = Arc::new(bench_locker());
                let handles: Vec<_> = (0..threads)
                    .map(|t| {
                        let locker = Arc::clone(&locker);
                        thread::spawn(move || {
                            for i in 0..200u64 {
                                let pair = [(t as u64 + i) % 4, (t as u64 + i + 1) % 4];
                                locker.lock_all(pair).unwrap();
                                locker.unlock_all(pair).unwrap();
                            }
                        })
                    })
                    .collect();
                for handle in handles {
                    handle.join().unwrap();
                }
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_single_key,
    bench_table_size,
    bench_batches,
    bench_normalize,
    bench_contended,
);

criterion_main!(benches);
