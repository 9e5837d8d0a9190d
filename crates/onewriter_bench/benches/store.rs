//! Store benchmarks: direct commits and log replay.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use onewriter_bench::{generate_writes, random_data};
use onewriter_store::{LogStore, MemoryBackend, Store, StoreConfig, Transaction};
use tempfile::TempDir;

/// Benchmark a single-put commit on the in-memory backend.
fn bench_memory_commit(c: &mut Criterion) {
    let mut group = c.benchmark_group("memory_commit");

    for size in [64, 256, 1024, 4096].iter() {
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let store = LogStore::in_memory();
            let data = random_data(size);
            let mut n = 0u64;

            b.iter(|| {
                n += 1;
                let mut txn = store.begin().unwrap();
                txn.put(n.to_be_bytes(), black_box(data.clone())).unwrap();
                txn.commit().unwrap();
            });
        });
    }
    group.finish();
}

/// Benchmark file-backed commits with and without a sync per commit.
fn bench_file_commit(c: &mut Criterion) {
    let mut group = c.benchmark_group("file_commit");

    for sync in [false, true] {
        let label = if sync { "sync" } else { "nosync" };
        group.bench_function(label, |b| {
            let dir = TempDir::new().unwrap();
            let config = StoreConfig::new().sync_on_commit(sync);
            let store = LogStore::open_file(&dir.path().join("bench.log"), config).unwrap();
            let data = random_data(256);
            let mut n = 0u64;

            b.iter(|| {
                n += 1;
                let mut txn = store.begin().unwrap();
                txn.put(n.to_be_bytes(), data.clone()).unwrap();
                txn.commit().unwrap();
            });
        });
    }
    group.finish();
}

/// Benchmark reopening a log of committed batches.
fn bench_replay(c: &mut Criterion) {
    let mut group = c.benchmark_group("replay");

    for batches in [100, 1000, 10000].iter() {
        group.throughput(Throughput::Elements(*batches as u64));
        group.bench_with_input(BenchmarkId::from_parameter(batches), batches, |b, &batches| {
            let backend = MemoryBackend::new();
            {
                let store = LogStore::open(backend.clone(), StoreConfig::default()).unwrap();
                for (key, value) in generate_writes(batches, 64) {
                    let mut txn = store.begin().unwrap();
                    txn.put(key, value).unwrap();
                    txn.commit().unwrap();
                }
            }

            b.iter(|| {
                let store = LogStore::open(backend.clone(), StoreConfig::default()).unwrap();
                black_box(store.len());
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_memory_commit, bench_file_commit, bench_replay);
criterion_main!(benches);
