//! Opcode dispatch through the query executor.

mod common;

use common::{context, seeded_store, HOUR, T};
use query_action::action::ManualClock;
use query_action::actions::{self, stats_trend, StatsTrendAction};
use query_action::cache::CacheKey;
use query_action::executor::{ActionRegistry, QueryExecutor};
use query_action::scheduler::TokioScheduler;
use query_action::store::InMemoryStatsStore;
use query_action::{Error, ErrorCode};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

fn executor_with(store: Arc<InMemoryStatsStore>, cachable: bool) -> QueryExecutor {
    let clock = Arc::new(ManualClock::new(T));
    let registry = Arc::new(ActionRegistry::new());
    let action_clock = Arc::clone(&clock);
    registry
        .register(stats_trend::OPCODE, move || {
            StatsTrendAction::new(store.clone())
                .with_clock(action_clock.clone())
                .cachable(cachable)
        })
        .unwrap();
    let scheduler = Arc::new(TokioScheduler::current().unwrap());
    QueryExecutor::new(registry, context(clock), scheduler)
}

fn parameter() -> Value {
    json!({
        "table": "clicks",
        "field": "latency",
        "from": T,
        "to": T + HOUR,
        "period": "hours"
    })
}

#[tokio::test]
async fn test_execute_by_opcode() {
    let store = seeded_store();
    let executor = executor_with(store.clone(), true);

    let first = executor.execute("statstrend", parameter()).await.unwrap();
    let second = executor.execute("statstrend", parameter()).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first["result"][0]["stats"]["count"], json!(3.0));
    assert_eq!(store.calls(), 1);
}

#[tokio::test]
async fn test_unknown_opcode() {
    let executor = executor_with(seeded_store(), true);
    let err = executor.execute("histogram", parameter()).await.unwrap_err();
    assert!(matches!(err, Error::UnknownOperation(ref op) if op == "histogram"));
    assert_eq!(err.code().as_str(), "UNKNOWN_OPERATION");

    let err = executor.execute_async("histogram", parameter()).unwrap_err();
    assert_eq!(err.code(), ErrorCode::UnknownOperation);
}

#[tokio::test]
async fn test_request_envelope() {
    let executor = executor_with(seeded_store(), false);
    let mut request = parameter();
    request["opcode"] = json!("statstrend");

    let response = executor.execute_request(request).await.unwrap();
    assert_eq!(response["result"].as_array().unwrap().len(), 2);

    let err = executor.execute_request(parameter()).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidRequest);
}

#[tokio::test]
async fn test_malformed_parameter() {
    let executor = executor_with(seeded_store(), true);
    let err = executor
        .execute("statstrend", json!({"table": "clicks", "from": "yesterday"}))
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidRequest);
}

#[tokio::test]
async fn test_async_execute_and_fetch() {
    let store = seeded_store();
    let executor = executor_with(store.clone(), true);

    let key = executor.execute_async("statstrend", parameter()).unwrap();
    let fetched = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Some(value) = executor.fetch("statstrend", &key).await.unwrap() {
                return value;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("async result never landed");

    let sync = executor.execute("statstrend", parameter()).await.unwrap();
    assert_eq!(fetched, sync);
    assert_eq!(store.calls(), 1);
    assert_eq!(executor.scheduler_stats().submitted, 1);
}

#[tokio::test]
async fn test_async_on_uncachable_action() {
    let executor = executor_with(seeded_store(), false);
    let err = executor.execute_async("statstrend", parameter()).unwrap_err();
    assert_eq!(err.code(), ErrorCode::CacheUnavailable);
}

#[tokio::test]
async fn test_fetch_on_uncachable_action() {
    let store = seeded_store();
    let executor = executor_with(store.clone(), false);
    let key = CacheKey::new(format!("stats-trend-clicks-latency-{}", T / 30_000));

    let err = executor.fetch("statstrend", &key).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::CacheUnavailable);
    assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn test_duplicate_registration() {
    let registry = ActionRegistry::new();
    let store = seeded_store();
    actions::register_builtin(&registry, store.clone()).unwrap();

    let err = actions::register_builtin(&registry, store).unwrap_err();
    assert_eq!(err.code(), ErrorCode::ConfigurationError);
    assert_eq!(registry.count(), 1);

    let descriptors = registry.descriptors();
    assert_eq!(descriptors[0].opcode, "statstrend");
    assert!(!descriptors[0].cachable);
}
