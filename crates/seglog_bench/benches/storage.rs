//! Store and index benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use seglog_bench::random_data;
use seglog_storage::{Index, Store, ENTRY_WIDTH};
use tempfile::TempDir;

/// Benchmark store appends.
fn bench_store_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_append");

    for size in [64, 1024, 4096].iter() {
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let temp_dir = TempDir::new().unwrap();
            let store = Store::open(&temp_dir.path().join("bench.store")).unwrap();
            let data = random_data(size);

            b.iter(|| {
                let (written, position) = store.append(black_box(&data)).unwrap();
                black_box((written, position));
            });
        });
    }

    group.finish();
}

/// Benchmark store reads, including the buffered-write flush.
fn bench_store_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_read");

    for size in [64, 1024, 4096].iter() {
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let temp_dir = TempDir::new().unwrap();
            let store = Store::open(&temp_dir.path().join("bench.store")).unwrap();
            let (_, position) = store.append(&random_data(size)).unwrap();

            b.iter(|| {
                let value = store.read(black_box(position)).unwrap();
                black_box(value);
            });
        });
    }

    group.finish();
}

/// Benchmark index writes and lookups.
fn bench_index(c: &mut Criterion) {
    let mut group = c.benchmark_group("index");
    const ENTRIES: u32 = 100_000;

    group.bench_function("write", |b| {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bench.index");
        let mut index = Index::open(&path, u64::from(ENTRIES) * ENTRY_WIDTH).unwrap();
        let mut next = 0u32;

        b.iter(|| {
            if next == ENTRIES {
                index.truncate_entries(0).unwrap();
                next = 0;
            }
            index.write(next, u64::from(next) * 64).unwrap();
            next += 1;
        });
    });

    group.bench_function("read", |b| {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bench.index");
        let mut index = Index::open(&path, u64::from(ENTRIES) * ENTRY_WIDTH).unwrap();
        for entry in 0..ENTRIES {
            index.write(entry, u64::from(entry) * 64).unwrap();
        }
        let mut entry = 0u32;

        b.iter(|| {
            entry = (entry + 7919) % ENTRIES;
            black_box(index.read(black_box(entry)).unwrap());
        });
    });

    group.finish();
}

criterion_group!(benches, bench_store_append, bench_store_read, bench_index);
criterion_main!(benches);
