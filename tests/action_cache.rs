//! Cache-through execution of the stats trend action.

mod common;

use common::{context, seeded_store, HOUR, T};
use query_action::action::{Invocation, ManualClock};
use query_action::actions::{Filter, Period, StatsTrendAction, StatsTrendRequest};
use query_action::cache::{CacheBackend, CacheRegistry, MemoryCache};
use query_action::{ErrorCode, ExecutionContext};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn request() -> StatsTrendRequest {
    StatsTrendRequest::new("clicks", "latency")
        .between(T, T + HOUR)
        .with_period(Period::Hours)
}

#[tokio::test]
async fn test_same_window_shares_one_result() {
    let clock = Arc::new(ManualClock::new(T + 5_000));
    let ctx = context(Arc::clone(&clock));
    let store = seeded_store();
    let action = Arc::new(StatsTrendAction::new(store.clone()).cachable(true));

    let first = Invocation::with_parameter(Arc::clone(&action), &ctx, request());
    let first_response = first.execute().await.unwrap();

    clock.advance(10_000);
    let second = Invocation::with_parameter(Arc::clone(&action), &ctx, request());
    let second_response = second.execute().await.unwrap();

    assert_eq!(first.cache_key().unwrap(), second.cache_key().unwrap());
    assert_eq!(
        serde_json::to_vec(&first_response).unwrap(),
        serde_json::to_vec(&second_response).unwrap()
    );
    assert_eq!(store.calls(), 1);

    let buckets = &first_response.result;
    assert_eq!(buckets.len(), 2);
    assert_eq!(buckets[0].period, T as i64);
    assert_eq!(buckets[0].stats["count"], 3.0);
    assert_eq!(buckets[0].stats["avg"], 20.0);
    assert_eq!(buckets[1].stats["count"], 1.0);
}

#[tokio::test]
async fn test_non_finite_input_is_still_cached() {
    let clock = Arc::new(ManualClock::new(T));
    let ctx = context(Arc::clone(&clock));
    let store = seeded_store();
    store.insert("clicks", json!({"_timestamp": T + 1, "latency": "NaN"}));
    store.insert("clicks", json!({"_timestamp": T + 2, "latency": "inf"}));
    let action = Arc::new(StatsTrendAction::new(store.clone()).cachable(true));

    let mut responses = Vec::new();
    for _ in 0..3 {
        let invocation = Invocation::with_parameter(Arc::clone(&action), &ctx, request());
        responses.push(invocation.execute().await.unwrap());
        clock.advance(5_000);
    }

    assert_eq!(store.calls(), 1);
    assert!(responses.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(responses[0].result[0].stats["count"], 3.0);
}

#[tokio::test]
async fn test_unstorable_response_fails_loudly() {
    let ctx = context(Arc::new(ManualClock::new(T)));
    let store = seeded_store();
    store.extend(
        "clicks",
        [
            json!({"_timestamp": T + 1, "latency": 1e300}),
            json!({"_timestamp": T + 2, "latency": 1e300}),
        ],
    );
    let action = Arc::new(StatsTrendAction::new(store.clone()).cachable(true));

    let invocation = Invocation::with_parameter(Arc::clone(&action), &ctx, request());
    let err = invocation.execute().await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::SerializationError);

    let key = invocation.cache_key().unwrap();
    assert!(invocation.lookup(&key).await.unwrap().is_none());

    // the uncached path hands the value back as computed
    let uncached = Invocation::with_parameter(Arc::new(StatsTrendAction::new(store)), &ctx, request())
        .execute()
        .await
        .unwrap();
    assert!(uncached.result[0].stats["sum_of_squares"].is_infinite());
}

#[tokio::test]
async fn test_next_window_recomputes() {
    let clock = Arc::new(ManualClock::new(T));
    let ctx = context(Arc::clone(&clock));
    let store = seeded_store();
    let action = Arc::new(StatsTrendAction::new(store.clone()).cachable(true));

    let before = Invocation::with_parameter(Arc::clone(&action), &ctx, request());
    before.execute().await.unwrap();

    clock.advance(30_000);
    let after = Invocation::with_parameter(Arc::clone(&action), &ctx, request());
    after.execute().await.unwrap();

    assert_ne!(before.cache_key().unwrap(), after.cache_key().unwrap());
    assert_eq!(store.calls(), 2);
}

#[tokio::test]
async fn test_key_format() {
    let clock = Arc::new(ManualClock::new(T + 12_345));
    let ctx = context(clock);
    let action = Arc::new(StatsTrendAction::new(seeded_store()).cachable(true));
    let invocation = Invocation::with_parameter(action, &ctx, request());

    let key = invocation.cache_key().unwrap();
    let expected_bucket = (T + 12_345) / 30_000;
    assert!(key.as_str().starts_with("stats-trend-clicks-latency-"));
    assert!(key.as_str().ends_with(&format!("-{}", expected_bucket)));
}

#[tokio::test]
async fn test_not_cachable_always_computes() {
    let ctx = context(Arc::new(ManualClock::new(T)));
    let store = seeded_store();
    let action = Arc::new(StatsTrendAction::new(store.clone()));

    let invocation = Invocation::with_parameter(action, &ctx, request());
    invocation.execute().await.unwrap();
    invocation.execute().await.unwrap();
    assert_eq!(store.calls(), 2);

    let key = invocation.cache_key().unwrap();
    let err = invocation.lookup(&key).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::CacheUnavailable);
    assert!(!ctx.registry().contains("statstrend"));
}

#[tokio::test]
async fn test_failure_is_not_cached() {
    let ctx = context(Arc::new(ManualClock::new(T)));
    let store = seeded_store();
    let action = Arc::new(StatsTrendAction::new(store.clone()).cachable(true));
    let invocation = Invocation::with_parameter(action, &ctx, request());

    store.fail_with("shard unavailable");
    let err = invocation.execute().await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::QueryExecutionError);
    let key = invocation.cache_key().unwrap();
    assert!(invocation.lookup(&key).await.unwrap().is_none());

    store.recover();
    invocation.execute().await.unwrap();
    assert!(invocation.lookup(&key).await.unwrap().is_some());
    assert_eq!(store.calls(), 2);
}

#[tokio::test]
async fn test_invalid_request_is_not_cached() {
    let ctx = context(Arc::new(ManualClock::new(T)));
    let store = seeded_store();
    let action = Arc::new(StatsTrendAction::new(store.clone()).cachable(true));
    for bad in [
        StatsTrendRequest::new("   ", "latency"),
        StatsTrendRequest::new("clicks", "").between(T, T + HOUR),
    ] {
        let invocation = Invocation::with_parameter(Arc::clone(&action), &ctx, bad);
        let err = invocation.execute().await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidRequest);
        let key = invocation.cache_key().unwrap();
        assert!(invocation.lookup(&key).await.unwrap().is_none());
    }
    assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn test_filters_change_key_and_result() {
    let ctx = context(Arc::new(ManualClock::new(T)));
    let action = Arc::new(StatsTrendAction::new(seeded_store()).cachable(true));

    let all = Invocation::with_parameter(Arc::clone(&action), &ctx, request());
    let errors = Invocation::with_parameter(
        Arc::clone(&action),
        &ctx,
        request().with_filter(Filter::Equals {
            field: "status".into(),
            value: json!("error"),
        }),
    );
    assert_ne!(all.cache_key().unwrap(), errors.cache_key().unwrap());

    let response = errors.execute().await.unwrap();
    assert_eq!(response.result[0].stats["count"], 1.0);
    assert_eq!(response.result[0].stats["sum"], 20.0);
}

#[tokio::test]
async fn test_custom_factory_builds_one_backend_per_name() {
    let created = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&created);
    let registry = Arc::new(CacheRegistry::new(move |_name: &str| {
        counter.fetch_add(1, Ordering::SeqCst);
        Arc::new(MemoryCache::new(16)) as Arc<dyn CacheBackend>
    }));
    let ctx = ExecutionContext::new(registry).with_clock(Arc::new(ManualClock::new(T)));
    let action = Arc::new(StatsTrendAction::new(seeded_store()).cachable(true));

    for _ in 0..3 {
        Invocation::with_parameter(Arc::clone(&action), &ctx, request())
            .execute()
            .await
            .unwrap();
    }
    assert_eq!(created.load(Ordering::SeqCst), 1);
    assert_eq!(ctx.registry().names(), vec!["statstrend".to_string()]);
}
