//! Throughput Benchmark for gache
//!
//! This benchmark measures the performance of the storage engine and the
//! request path under various workloads.

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use gache::commands::CommandHandler;
use gache::protocol::Request;
use gache::storage::{now_epoch, StorageEngine};
use std::sync::Arc;
use std::time::Duration;

/// Benchmark SET operations
fn bench_set(c: &mut Criterion) {
    let engine = Arc::new(StorageEngine::new());

    let mut group = c.benchmark_group("set");
    group.throughput(Throughput::Elements(1));

    group.bench_function("set_small", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let _ = engine.set(&format!("key_{}", i), Bytes::from_static(b"small_value"), 0);
            i += 1;
        });
    });

    group.bench_function("set_medium", |b| {
        let mut i = 0u64;
        let value = Bytes::from("x".repeat(1024)); // 1KB value
        b.iter(|| {
            let _ = engine.set(&format!("medium_{}", i), value.clone(), 0);
            i += 1;
        });
    });

    group.bench_function("set_with_ttl", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let _ = engine.set(&format!("ttl_{}", i), Bytes::from_static(b"value"), 3600);
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark GET operations
fn bench_get(c: &mut Criterion) {
    let engine = Arc::new(StorageEngine::new());

    // Pre-populate with data
    for i in 0..100_000 {
        let _ = engine.set(&format!("key_{}", i), format!("value_{}", i), 0);
    }

    let mut group = c.benchmark_group("get");
    group.throughput(Throughput::Elements(1));

    group.bench_function("get_existing", |b| {
        let mut i = 0u64;
        b.iter(|| {
            black_box(engine.get(&format!("key_{}", i % 100_000)).ok());
            i += 1;
        });
    });

    group.bench_function("get_missing", |b| {
        let mut i = 0u64;
        b.iter(|| {
            black_box(engine.get(&format!("missing_{}", i)).ok());
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark mixed read/write workload
fn bench_mixed(c: &mut Criterion) {
    let engine = Arc::new(StorageEngine::new());

    // Pre-populate
    for i in 0..10_000 {
        let _ = engine.set(&format!("key_{}", i), format!("value_{}", i), 0);
    }

    let mut group = c.benchmark_group("mixed");
    group.throughput(Throughput::Elements(1));

    group.bench_function("80_read_20_write", |b| {
        let mut i = 0u64;
        b.iter(|| {
            if i % 5 == 0 {
                // 20% writes
                let _ = engine.update(&format!("key_{}", i % 10_000), "value", 0);
            } else {
                // 80% reads
                black_box(engine.get(&format!("key_{}", i % 10_000)).ok());
            }
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark list and dictionary operations
fn bench_containers(c: &mut Criterion) {
    let engine = Arc::new(StorageEngine::new());
    let _ = engine.lset("stack", ["seed"], 0);
    let _ = engine.dset("dict", vec![Bytes::from("a"), Bytes::from("1")], 0);

    let mut group = c.benchmark_group("containers");
    group.throughput(Throughput::Elements(1));

    group.bench_function("lpush_lpop", |b| {
        b.iter(|| {
            let _ = engine.lpush("stack", Bytes::from_static(b"value"));
            black_box(engine.lpop("stack").ok());
        });
    });

    group.bench_function("dadd_dget", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let sub = format!("f{}", i % 1000);
            let _ = engine.dadd("dict", &sub, Bytes::from_static(b"value"));
            black_box(engine.dget("dict", &sub).ok());
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark concurrent access
fn bench_concurrent(c: &mut Criterion) {
    use std::thread;

    let mut group = c.benchmark_group("concurrent");
    group.measurement_time(Duration::from_secs(10));

    group.bench_function("4_threads_mixed", |b| {
        b.iter(|| {
            let engine = Arc::new(StorageEngine::new());
            let handles: Vec<_> = (0..4)
                .map(|t| {
                    let engine = Arc::clone(&engine);
                    thread::spawn(move || {
                        for i in 0..10_000 {
                            let key = format!("key_{}_{}", t, i);
                            let _ = engine.set(&key, "value", 60);
                            let _ = engine.get(&key);
                        }
                    })
                })
                .collect();

            for handle in handles {
                handle.join().unwrap();
            }

            black_box(engine.len());
        });
    });

    group.finish();
}

/// Benchmark sweeping a full second's worth of expired keys
fn bench_expiry(c: &mut Criterion) {
    let mut group = c.benchmark_group("expiry");

    group.bench_function("expire_due_10k", |b| {
        b.iter_batched(
            || {
                let engine = StorageEngine::new();
                for i in 0..10_000 {
                    let _ = engine.set(&format!("key_{}", i), "value", 1);
                }
                engine
            },
            |engine| black_box(engine.expire_due(now_epoch() + 2)),
            criterion::BatchSize::LargeInput,
        );
    });

    group.finish();
}

/// Benchmark request parsing and full command execution
fn bench_requests(c: &mut Criterion) {
    let handler = CommandHandler::new(Arc::new(StorageEngine::new()));
    let _ = handler.execute_line("SET hot some cached value 0");

    let mut group = c.benchmark_group("requests");
    group.throughput(Throughput::Elements(1));

    group.bench_function("parse_set", |b| {
        b.iter(|| black_box(Request::parse("SET user_42 some longer value here 3600\r\n").ok()));
    });

    group.bench_function("execute_get", |b| {
        b.iter(|| black_box(handler.execute_line("GET hot").serialize()));
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_set,
    bench_get,
    bench_mixed,
    bench_containers,
    bench_concurrent,
    bench_expiry,
    bench_requests,
);

criterion_main!(benches);
