//! Exclusive writer benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use onewriter_bench::{generate_writes, random_data, random_key};
use onewriter_core::{share, ExclusiveWriter};
use onewriter_store::{LogStore, MemoryBackend, Store, Transaction};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

type Mem = LogStore<MemoryBackend>;

/// Benchmark a no-op task with no contention.
fn bench_detached_submit(c: &mut Criterion) {
    let writer: ExclusiveWriter<Mem> = ExclusiveWriter::new();

    c.bench_function("detached_submit", |b| {
        b.iter(|| {
            let value = writer.submit_detached(|_| Ok::<_, ()>(black_box(1u64))).unwrap();
            black_box(value);
        });
    });
}

/// Benchmark one scoped put-and-commit per task.
fn bench_scoped_commit(c: &mut Criterion) {
    let mut group = c.benchmark_group("scoped_commit");

    for size in [64, 256, 1024, 4096].iter() {
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let store = Arc::new(Mem::in_memory());
            let writer: ExclusiveWriter<Mem> = ExclusiveWriter::new();
            let data = random_data(size);

            b.iter(|| {
                let key = random_key();
                let value = data.clone();
                writer
                    .submit_scoped(&store, move |ctx| {
                        ctx.txn().unwrap().put(key, black_box(value))
                    })
                    .unwrap();
            });
        });
    }
    group.finish();
}

/// Benchmark many small tasks against one caller-held transaction.
fn bench_caller_txn(c: &mut Criterion) {
    let mut group = c.benchmark_group("caller_txn");

    for batch_size in [10, 100, 1000].iter() {
        group.throughput(Throughput::Elements(*batch_size as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(batch_size),
            batch_size,
            |b, &batch_size| {
                let store = Mem::in_memory();
                let writer: ExclusiveWriter<Mem> = ExclusiveWriter::new();
                let writes = generate_writes(batch_size, 64);

                b.iter(|| {
                    let txn = share(store.begin().unwrap());
                    for (key, value) in &writes {
                        let (key, value) = (key.clone(), value.clone());
                        writer
                            .submit_in(&txn, move |ctx| ctx.txn().unwrap().put(key, value))
                            .unwrap();
                    }
                    txn.lock().commit().unwrap();
                });
            },
        );
    }
    group.finish();
}

/// Benchmark submission throughput with several submitting threads.
fn bench_contended_submit(c: &mut Criterion) {
    let mut group = c.benchmark_group("contended_submit");
    const TASKS_PER_THREAD: usize = 100;

    for threads in [1, 2, 4, 8].iter() {
        group.throughput(Throughput::Elements((*threads * TASKS_PER_THREAD) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(threads), threads, |b, &threads| {
            let store = Arc::new(Mem::in_memory());
            let writer: Arc<ExclusiveWriter<Mem>> = Arc::new(ExclusiveWriter::new());

            b.iter_custom(|iters| {
                let mut total = Duration::ZERO;
                for _ in 0..iters {
                    let barrier = Arc::new(Barrier::new(threads + 1));
                    let handles: Vec<_> = (0..threads)
                        .map(|_| {
                            let store = Arc::clone(&store);
                            let writer = Arc::clone(&writer);
                            let barrier = Arc::clone(&barrier);
                            thread::spawn(move || {
                                barrier.wait();
                                for _ in 0..TASKS_PER_THREAD {
                                    let key = random_key();
                                    writer
                                        .submit_scoped(&store, move |ctx| {
                                            ctx.txn().unwrap().put(key, "v")
                                        })
                                        .unwrap();
                                }
                            })
                        })
                        .collect();

                    barrier.wait();
                    let start = Instant::now();
                    for handle in handles {
                        handle.join().unwrap();
                    }
                    total += start.elapsed();
                }
                total
            });
        });
    }
    group.finish();
}

/// Benchmark the first submit after the worker has retired.
fn bench_cold_start(c: &mut Criterion) {
    let writer: ExclusiveWriter<Mem> = ExclusiveWriter::new();

    c.bench_function("cold_start_submit", |b| {
        b.iter_custom(|iters| {
            let mut total = Duration::ZERO;
            for _ in 0..iters {
                while writer.is_active() {
                    thread::yield_now();
                }
                let start = Instant::now();
                writer.submit_detached(|_| Ok::<_, ()>(())).unwrap();
                total += start.elapsed();
            }
            total
        });
    });
}

criterion_group!(
    benches,
    bench_detached_submit,
    bench_scoped_commit,
    bench_caller_txn,
    bench_contended_submit,
    bench_cold_start,
);
criterion_main!(benches);
