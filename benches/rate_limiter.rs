//! # Rate Limiter Benchmarks
//!
//! Performance benchmarks for the uncontended paths. The waiting path is
//! dominated by the configured quota, not by the implementation, so the
//! interesting costs are the decision pass and the keyed-manager lookup.
//!
//! Run with: `cargo bench`

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use pacer::{KeyedRateLimiterManager, RateLimiter, RateLimiterConfig};
use std::sync::Arc;
use std::time::Duration;

/// Benchmark the uncontended decision pass via try_acquire.
///
/// Large quotas keep every probe on the grant path, so this measures
/// lock + bookkeeping cost rather than waiting.
fn bench_try_acquire(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("try_acquire");

    for quota in [100u32, 10_000, 1_000_000] {
        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::from_parameter(quota), &quota, |b, &quota| {
            let limiter = RateLimiter::new(quota, Duration::from_secs(3600)).unwrap();
            b.to_async(&rt)
                .iter(|| async { std::hint::black_box(limiter.try_acquire().await) });
        });
    }

    group.finish();
}

/// Benchmark acquire when a slot is always free (no sleeping involved).
fn bench_uncontended_acquire(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("uncontended_acquire", |b| {
        let limiter = RateLimiter::new(u32::MAX, Duration::from_millis(1)).unwrap();
        b.to_async(&rt)
            .iter(|| async { std::hint::black_box(limiter.acquire().await) });
    });
}

/// Benchmark the decision pass with a full window being evicted each
/// round: worst-case bookkeeping (evict `max_requests` stale entries).
fn bench_eviction_heavy_pass(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("eviction_heavy");

    for quota in [8u32, 64, 512] {
        group.bench_with_input(BenchmarkId::from_parameter(quota), &quota, |b, &quota| {
            // A 1 ms window means earlier grants are stale by the next
            // iteration and get purged in the decision pass.
            let limiter = RateLimiter::new(quota, Duration::from_millis(1)).unwrap();
            b.to_async(&rt)
                .iter(|| async { std::hint::black_box(limiter.try_acquire().await) });
        });
    }

    group.finish();
}

/// Benchmark the keyed-manager lookup on a warm map.
fn bench_manager_lookup(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("manager_lookup");

    for num_keys in [1usize, 16, 256] {
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{num_keys}_keys")),
            &num_keys,
            |b, &num_keys| {
                let manager = Arc::new(
                    KeyedRateLimiterManager::new(RateLimiterConfig::new(
                        u32::MAX,
                        Duration::from_secs(3600),
                    ))
                    .unwrap(),
                );
                let keys: Vec<String> = (0..num_keys).map(|i| format!("endpoint-{i}")).collect();
                for key in &keys {
                    manager.limiter(key).unwrap();
                }

                let mut i = 0;
                b.to_async(&rt).iter(|| {
                    let key = keys[i % keys.len()].clone();
                    i += 1;
                    let manager = manager.clone();
                    async move { std::hint::black_box(manager.try_acquire(&key).await) }
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_try_acquire,
    bench_uncontended_acquire,
    bench_eviction_heavy_pass,
    bench_manager_lookup
);
criterion_main!(benches);
