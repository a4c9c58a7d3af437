//! Benchmarks for cache key derivation and cache-through hits
//!
//! This benchmark measures:
//! - Fingerprinting a stats trend request
//! - Bucketed key derivation
//! - A warm cache hit through `Invocation::execute`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;

use query_action::action::{ExecutionContext, Invocation, ManualClock};
use query_action::actions::{Filter, StatsTrendAction, StatsTrendRequest};
use query_action::cache::{CacheRegistry, MemoryCacheFactory, TimeWindow};
use query_action::store::InMemoryStatsStore;
use query_action::Fingerprint;

const T: u64 = 1_700_002_800_000;

fn request(filters: usize) -> StatsTrendRequest {
    (0..filters).fold(
        StatsTrendRequest::new("clicks", "latency").between(T, T + 3_600_000),
        |req, i| {
            req.with_filter(Filter::Exists {
                field: format!("attr_{}", i),
            })
        },
    )
}

fn bench_fingerprint(c: &mut Criterion) {
    let mut group = c.benchmark_group("fingerprint");
    for filters in [0usize, 4, 16] {
        let req = request(filters);
        group.bench_with_input(BenchmarkId::from_parameter(filters), &req, |b, req| {
            b.iter(|| black_box(req.fingerprint()))
        });
    }
    group.finish();
}

fn bench_key_derivation(c: &mut Criterion) {
    let window = TimeWindow::default();
    let fp = request(4).fingerprint();
    c.bench_function("bucketed_key", |b| {
        b.iter(|| black_box(window.key_for(black_box(&fp), black_box(T + 12_345))))
    });
}

fn bench_cache_hit(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let ctx = ExecutionContext::new(Arc::new(CacheRegistry::new(MemoryCacheFactory::new(1_000))))
        .with_clock(Arc::new(ManualClock::new(T)));
    let action = Arc::new(StatsTrendAction::new(Arc::new(InMemoryStatsStore::new())).cachable(true));

    rt.block_on(async {
        Invocation::with_parameter(Arc::clone(&action), &ctx, request(4))
            .execute()
            .await
            .unwrap();
    });

    c.bench_function("execute_cache_hit", |b| {
        b.to_async(&rt).iter(|| async {
            Invocation::with_parameter(Arc::clone(&action), &ctx, request(4))
                .execute()
                .await
                .unwrap()
        })
    });
}

criterion_group!(benches, bench_fingerprint, bench_key_derivation, bench_cache_hit);
criterion_main!(benches);
