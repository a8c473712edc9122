//! Proxy selection strategies.
//!
//! Selectors are pure: they read a snapshot of the pool and never touch
//! the store. Sequential rotation receives its cursor from the caller.

use crate::config::Strategy;
use crate::proxy::ProxyRecord;

use rand::Rng;
use std::cmp::Ordering;

/// Chooses one record from a snapshot of the pool.
pub trait SelectionStrategy: Send + Sync {
    /// Select a record, or `None` if `records` is empty.
    ///
    /// `cursor` is only meaningful for strategies where `uses_cursor` is true.
    fn select<'a>(&self, records: &'a [ProxyRecord], cursor: u64) -> Option<&'a ProxyRecord>;

    /// Whether the caller must advance the shared cursor for each selection.
    fn uses_cursor(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str;
}

/// Picks the record with the best success rate.
///
/// Ties go to fewer failures, then to the earliest inserted record.
#[derive(Debug, Default)]
pub struct SmartSelector;

impl SmartSelector {
    fn rank(a: &ProxyRecord, b: &ProxyRecord) -> Ordering {
        b.success_rate()
            .total_cmp(&a.success_rate())
            .then(a.failure_count.cmp(&b.failure_count))
    }
}

impl SelectionStrategy for SmartSelector {
    fn select<'a>(&self, records: &'a [ProxyRecord], _cursor: u64) -> Option<&'a ProxyRecord> {
        // min_by keeps the first of equal elements, preserving insertion order.
        records.iter().min_by(|a, b| Self::rank(a, b))
    }

    fn name(&self) -> &'static str {
        "smart"
    }
}

/// Picks a uniformly random record on every call.
#[derive(Debug, Default)]
pub struct RandomSelector;

impl SelectionStrategy for RandomSelector {
    fn select<'a>(&self, records: &'a [ProxyRecord], _cursor: u64) -> Option<&'a ProxyRecord> {
        if records.is_empty() {
            return None;
        }
        let idx = rand::rng().random_range(0..records.len());
        records.get(idx)
    }

    fn name(&self) -> &'static str {
        "random"
    }
}

/// Round-robin over the pool in insertion order.
#[derive(Debug, Default)]
pub struct SequentialSelector;

impl SelectionStrategy for SequentialSelector {
    fn select<'a>(&self, records: &'a [ProxyRecord], cursor: u64) -> Option<&'a ProxyRecord> {
        if records.is_empty() {
            return None;
        }
        // The pool may have shrunk since the cursor was issued.
        let idx = (cursor % records.len() as u64) as usize;
        records.get(idx)
    }

    fn uses_cursor(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "sequential"
    }
}

/// Create a selector for the configured strategy.
pub fn create_selector(strategy: Strategy) -> Box<dyn SelectionStrategy> {
    match strategy {
        Strategy::Smart => Box::new(SmartSelector),
        Strategy::Random => Box::new(RandomSelector),
        Strategy::Sequential => Box::new(SequentialSelector),
    }
}
