//! Storage for the proxy set and its counters.
//!
//! Compound updates (`record_success`, `record_failure`, `insert`,
//! `advance_cursor`) must each be atomic per key in every implementation:
//! concurrent callers never observe or act on a half-applied update.

mod memory;
#[cfg(feature = "redis")]
mod redis_store;

pub use memory::MemoryStore;
#[cfg(feature = "redis")]
pub use redis_store::RedisStore;

use crate::error::Result;
use crate::proxy::ProxyRecord;

use async_trait::async_trait;

/// Result of recording a failure against a record that exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureOutcome {
    /// Consecutive failures after the increment.
    pub failure_count: u64,
    /// Whether the record was removed by this call.
    pub evicted: bool,
}

/// Durable keyed storage for the proxy pool.
#[async_trait]
pub trait ProxyStore: Send + Sync {
    /// All records in insertion order.
    async fn get_all(&self) -> Result<Vec<ProxyRecord>>;

    async fn get(&self, key: &str) -> Result<Option<ProxyRecord>>;

    /// Number of records in the pool.
    async fn len(&self) -> Result<usize>;

    async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// Admit `key` with zeroed counters unless it is already present.
    ///
    /// Returns `true` if the key was admitted.
    async fn insert(&self, key: &str) -> Result<bool>;

    /// Increment the success and total counters and reset failures to zero.
    ///
    /// Returns `false` if `key` is not in the pool.
    async fn record_success(&self, key: &str) -> Result<bool>;

    /// Increment the failure and total counters, removing the record when
    /// the new failure count reaches `threshold`.
    ///
    /// Returns `None` if `key` is not in the pool.
    async fn record_failure(&self, key: &str, threshold: u32) -> Result<Option<FailureOutcome>>;

    /// Returns `true` if a record was removed.
    async fn remove(&self, key: &str) -> Result<bool>;

    /// Remove every record and reset the rotation cursor.
    async fn clear(&self) -> Result<()>;

    /// Current rotation cursor.
    async fn cursor(&self) -> Result<u64>;

    /// Return the current cursor and advance it by one.
    async fn advance_cursor(&self) -> Result<u64>;
}
