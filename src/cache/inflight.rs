//! Per-key in-flight computation locks.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

// Outcome published by the holder that computed it, read by later holders.
type Outcome = Option<Arc<dyn Any + Send + Sync>>;

/// Table of per-key async locks. At most one holder per key at a time; the
/// entry is dropped from the table once nobody holds or waits on it.
///
/// A holder can [`publish`](InFlightGuard::publish) its result; callers that
/// were queued on the same key receive it from
/// [`outcome`](InFlightGuard::outcome) without consulting any backend.
#[derive(Default)]
pub struct InFlightTable {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<Outcome>>>>,
}

impl InFlightTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until this caller is the only one working on `key`.
    pub async fn acquire(&self, key: &str) -> InFlightGuard<'_> {
        let lock = {
            let mut map = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            Arc::clone(
                map.entry(key.to_string())
                    .or_insert_with(|| Arc::new(AsyncMutex::new(None))),
            )
        };
        let guard = lock.lock_owned().await;
        InFlightGuard {
            table: self,
            key: key.to_string(),
            guard: Some(guard),
        }
    }

    /// Returns `true` when another caller currently holds or awaits `key`.
    pub fn is_contended(&self, key: &str) -> bool {
        let map = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        map.get(key).map(|l| l.try_lock().is_err()).unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct InFlightGuard<'a> {
    table: &'a InFlightTable,
    key: String,
    guard: Option<OwnedMutexGuard<Outcome>>,
}

impl InFlightGuard<'_> {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Result published by an earlier holder of this key, if it was a `V`.
    pub fn outcome<V>(&self) -> Option<V>
    where
        V: Clone + 'static,
    {
        self.guard
            .as_ref()
            .and_then(|g| g.as_ref())
            .and_then(|value| value.downcast_ref::<V>())
            .cloned()
    }

    /// Hands `value` to every caller still queued on this key.
    pub fn publish<V>(&mut self, value: V)
    where
        V: Send + Sync + 'static,
    {
        if let Some(guard) = self.guard.as_mut() {
            **guard = Some(Arc::new(value));
        }
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        // release first so the strong count below reflects waiters only
        self.guard.take();
        let mut map = self.table.locks.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(lock) = map.get(&self.key) {
            if Arc::strong_count(lock) == 1 {
                map.remove(&self.key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_entry_removed_after_release() {
        let table = InFlightTable::new();
        {
            let guard = table.acquire("k").await;
            assert_eq!(guard.key(), "k");
            assert_eq!(table.len(), 1);
        }
        assert!(table.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_second_caller_waits_for_first() {
        let table = Arc::new(InFlightTable::new());
        let order = Arc::new(Mutex::new(Vec::new()));

        let first = table.acquire("k").await;
        let waiter = {
            let table = table.clone();
            let order = order.clone();
            tokio::spawn(async move {
                let _g = table.acquire("k").await;
                order.lock().unwrap().push("second");
            })
        };
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(table.is_contended("k"));
        order.lock().unwrap().push("first");
        drop(first);
        waiter.await.unwrap();

        assert_eq!(*order.lock().unwrap(), vec!["first", "second"]);
        assert!(table.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_waiter_receives_published_outcome() {
        let table = Arc::new(InFlightTable::new());

        let mut leader = table.acquire("k").await;
        assert_eq!(leader.outcome::<u64>(), None);
        let waiter = {
            let table = table.clone();
            tokio::spawn(async move {
                let guard = table.acquire("k").await;
                (guard.outcome::<u64>(), guard.outcome::<String>())
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        leader.publish(42u64);
        drop(leader);

        assert_eq!(waiter.await.unwrap(), (Some(42), None));
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn test_outcome_does_not_outlive_entry() {
        let table = InFlightTable::new();
        {
            let mut guard = table.acquire("k").await;
            guard.publish(1u64);
        }
        let fresh = table.acquire("k").await;
        assert_eq!(fresh.outcome::<u64>(), None);
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_block() {
        let table = InFlightTable::new();
        let _a = table.acquire("a").await;
        let _b = table.acquire("b").await;
        assert_eq!(table.len(), 2);
    }
}
