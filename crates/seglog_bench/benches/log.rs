//! Log operation benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::Rng;
use seglog_bench::{filled_log, large_segments, random_data, temp_log};
use seglog_core::Config;
use seglog_storage::ENTRY_WIDTH;

/// Benchmark appends within one segment.
fn bench_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("append");

    for size in [64, 256, 1024, 4096].iter() {
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let (_dir, log) = temp_log(large_segments());
            let data = random_data(size);

            b.iter(|| {
                let offset = log.append(black_box(&data)).unwrap();
                black_box(offset);
            });
        });
    }

    group.finish();
}

/// Benchmark appends that roll to a new segment every few records.
fn bench_append_with_rollover(c: &mut Criterion) {
    let mut group = c.benchmark_group("append_rollover");
    group.sample_size(20);

    for per_segment in [16u64, 256].iter() {
        group.bench_with_input(
            BenchmarkId::from_parameter(per_segment),
            per_segment,
            |b, &per_segment| {
                let config = Config::new()
                    .max_store_bytes(1024 * 1024 * 1024)
                    .max_index_bytes(per_segment * ENTRY_WIDTH);
                let (_dir, log) = temp_log(config);
                let data = random_data(256);

                b.iter(|| {
                    let offset = log.append(black_box(&data)).unwrap();
                    black_box(offset);
                });
            },
        );
    }

    group.finish();
}

/// Benchmark random reads across many segments.
fn bench_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("read");
    const RECORDS: usize = 10_000;

    for per_segment in [100u64, 10_000].iter() {
        group.throughput(Throughput::Bytes(256));
        group.bench_with_input(
            BenchmarkId::new("records_per_segment", per_segment),
            per_segment,
            |b, &per_segment| {
                let config = large_segments().max_index_bytes(per_segment * ENTRY_WIDTH);
                let (_dir, log) = filled_log(config, RECORDS, 256);
                let mut rng = rand::thread_rng();

                b.iter(|| {
                    let offset = rng.gen_range(0..RECORDS as u64);
                    let value = log.read(black_box(offset)).unwrap();
                    black_box(value);
                });
            },
        );
    }

    group.finish();
}

/// Benchmark reopening a log with many segments.
fn bench_reopen(c: &mut Criterion) {
    let mut group = c.benchmark_group("reopen");
    group.sample_size(20);

    group.bench_function("100_segments", |b| {
        let config = large_segments().max_index_bytes(10 * ENTRY_WIDTH);
        let (dir, log) = filled_log(config.clone(), 1_000, 64);
        log.close().unwrap();
        drop(log);

        b.iter(|| {
            let log = seglog_core::Log::open(dir.path(), config.clone()).unwrap();
            black_box(log.highest_offset().unwrap());
            log.close().unwrap();
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_append,
    bench_append_with_rollover,
    bench_read,
    bench_reopen
);
criterion_main!(benches);
