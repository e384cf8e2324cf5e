//! Append benchmarks.

use binlog_bench::{generate_records, memory_log, random_key};
use binlog_core::{Binlog, BinlogConfig, RecordView, DEFAULT_PREALLOC_STEP};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tempfile::TempDir;

/// Benchmark appends to an in-memory log.
fn bench_memory_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("memory_append");

    for size in [0, 64, 1024, 16 * 1024].iter() {
        group.throughput(Throughput::Bytes(*size as u64 + 96));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let mut log = memory_log(DEFAULT_PREALLOC_STEP);
            let record = generate_records(1, size).remove(0);

            b.iter(|| {
                let lsn = log.append(black_box(&record)).unwrap();
                black_box(lsn);
            });
        });
    }

    group.finish();
}

/// Benchmark appends to a file, with and without preallocation.
fn bench_file_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("file_append");

    // Every append flushes
    group.sample_size(20);

    for prealloc in [true, false] {
        let name = if prealloc { "prealloc" } else { "no_prealloc" };
        group.throughput(Throughput::Bytes(1024 + 96));
        group.bench_function(name, |b| {
            let temp_dir = TempDir::new().unwrap();
            let config = BinlogConfig::new(temp_dir.path().join("bench.binlog"))
                .unwrap()
                .with_preallocation(prealloc);
            let mut log = Binlog::open(config).unwrap();
            let record = RecordView::put(random_key(), vec![7u8; 1024]);

            b.iter(|| {
                let lsn = log.append(black_box(&record)).unwrap();
                black_box(lsn);
            });

            log.close().unwrap();
        });
    }

    group.finish();
}

/// Benchmark growth-heavy appends with a small preallocation step.
fn bench_small_step_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("small_step_append");

    for step in [4096u64, 64 * 1024].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(step), step, |b, &step| {
            let records = generate_records(64, 512);

            b.iter(|| {
                let mut log = memory_log(step);
                for record in &records {
                    log.append(record).unwrap();
                }
                black_box(log.append_position());
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_memory_append,
    bench_file_append,
    bench_small_step_append
);
criterion_main!(benches);
