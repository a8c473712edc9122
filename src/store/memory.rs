//! In-process store.

use super::{FailureOutcome, ProxyStore};
use crate::error::Result;
use crate::proxy::ProxyRecord;

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

#[derive(Default)]
struct State {
    /// Keys in insertion order.
    order: Vec<String>,
    records: HashMap<String, ProxyRecord>,
    cursor: u64,
}

impl State {
    fn remove(&mut self, key: &str) -> bool {
        if self.records.remove(key).is_none() {
            return false;
        }
        self.order.retain(|k| k != key);
        true
    }
}

/// Store that keeps the pool in process memory.
///
/// Every operation runs under a single lock, so compound updates are atomic.
/// Contents do not survive a restart.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with records, keeping their order and counters.
    pub fn with_records(records: impl IntoIterator<Item = ProxyRecord>) -> Self {
        let mut state = State::default();
        for record in records {
            if !state.records.contains_key(&record.key) {
                state.order.push(record.key.clone());
                state.records.insert(record.key.clone(), record);
            }
        }
        Self {
            state: Mutex::new(state),
        }
    }
}

#[async_trait]
impl ProxyStore for MemoryStore {
    async fn get_all(&self) -> Result<Vec<ProxyRecord>> {
        let state = self.state.lock();
        Ok(state
            .order
            .iter()
            .filter_map(|key| state.records.get(key).cloned())
            .collect())
    }

    async fn get(&self, key: &str) -> Result<Option<ProxyRecord>> {
        Ok(self.state.lock().records.get(key).cloned())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.state.lock().order.len())
    }

    async fn insert(&self, key: &str) -> Result<bool> {
        let mut state = self.state.lock();
        if state.records.contains_key(key) {
            return Ok(false);
        }
        state.order.push(key.to_string());
        state.records.insert(key.to_string(), ProxyRecord::new(key));
        Ok(true)
    }

    async fn record_success(&self, key: &str) -> Result<bool> {
        let mut state = self.state.lock();
        match state.records.get_mut(key) {
            Some(record) => {
                record.success_count += 1;
                record.failure_count = 0;
                record.total_requests += 1;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn record_failure(&self, key: &str, threshold: u32) -> Result<Option<FailureOutcome>> {
        let mut state = self.state.lock();
        let failure_count = match state.records.get_mut(key) {
            Some(record) => {
                record.failure_count += 1;
                record.total_requests += 1;
                record.failure_count
            }
            None => return Ok(None),
        };

        let evicted = failure_count >= u64::from(threshold);
        if evicted {
            state.remove(key);
        }
        Ok(Some(FailureOutcome {
            failure_count,
            evicted,
        }))
    }

    async fn remove(&self, key: &str) -> Result<bool> {
        Ok(self.state.lock().remove(key))
    }

    async fn clear(&self) -> Result<()> {
        let mut state = self.state.lock();
        state.order.clear();
        state.records.clear();
        state.cursor = 0;
        Ok(())
    }

    async fn cursor(&self) -> Result<u64> {
        Ok(self.state.lock().cursor)
    }

    async fn advance_cursor(&self) -> Result<u64> {
        let mut state = self.state.lock();
        let current = state.cursor;
        state.cursor = current.wrapping_add(1);
        Ok(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;

    #[tokio::test]
    async fn test_insert_skips_duplicates_and_keeps_order() {
        let store = MemoryStore::new();
        assert!(assert_ok!(store.insert("b:1").await));
        assert!(assert_ok!(store.insert("a:1").await));
        assert!(!assert_ok!(store.insert("b:1").await));

        let keys: Vec<String> = store.get_all().await.unwrap().into_iter().map(|r| r.key).collect();
        assert_eq!(keys, vec!["b:1", "a:1"]);
    }

    #[tokio::test]
    async fn test_success_resets_failures() {
        let store = MemoryStore::new();
        store.insert("a:1").await.unwrap();
        store.record_failure("a:1", 5).await.unwrap();
        store.record_failure("a:1", 5).await.unwrap();
        assert!(store.record_success("a:1").await.unwrap());

        let record = store.get("a:1").await.unwrap().unwrap();
        assert_eq!(record.failure_count, 0);
        assert_eq!(record.success_count, 1);
        assert_eq!(record.total_requests, 3);
    }

    #[tokio::test]
    async fn test_failure_evicts_at_threshold() {
        let store = MemoryStore::new();
        store.insert("a:1").await.unwrap();

        let first = store.record_failure("a:1", 2).await.unwrap().unwrap();
        assert_eq!(first, FailureOutcome { failure_count: 1, evicted: false });

        let second = store.record_failure("a:1", 2).await.unwrap().unwrap();
        assert_eq!(second, FailureOutcome { failure_count: 2, evicted: true });

        assert!(store.get("a:1").await.unwrap().is_none());
        assert_eq!(store.record_failure("a:1", 2).await.unwrap(), None);
        assert_eq!(store.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unknown_keys_are_reported() {
        let store = MemoryStore::new();
        assert!(!store.record_success("missing:1").await.unwrap());
        assert!(!store.remove("missing:1").await.unwrap());
    }

    #[tokio::test]
    async fn test_cursor_advances_and_clear_resets() {
        let store = MemoryStore::with_records(vec![ProxyRecord::new("a:1")]);
        assert_eq!(store.advance_cursor().await.unwrap(), 0);
        assert_eq!(store.advance_cursor().await.unwrap(), 1);
        assert_eq!(store.cursor().await.unwrap(), 2);

        store.clear().await.unwrap();
        assert_eq!(store.cursor().await.unwrap(), 0);
        assert!(store.is_empty().await.unwrap());
    }
}
