//! In-memory event store
//!
//! Reference implementation of the [`EventStore`] contract backed by plain
//! vectors behind an `RwLock`. Suitable for tests, the replay binary, and
//! deployments where the monitored window fits in memory. Failure events are
//! append-only; attempt samples are pruned against a configurable retention
//! window on every insert, so rate denominators stay bounded without tying
//! their lifetime to any cache TTL.

use crate::error::StoreError;
use crate::events::{AttemptSample, FailureEvent, FailureRecord, Timestamp};
use crate::store::{EventFilter, EventStore};
use chrono::{Duration, Utc};
use std::collections::VecDeque;
use std::sync::RwLock;

/// Default retention for attempt samples: comfortably longer than the
/// largest default rule window (1 hour).
const DEFAULT_ATTEMPT_RETENTION_HOURS: i64 = 168;

struct Inner {
    failures: Vec<FailureRecord>,
    attempts: VecDeque<AttemptSample>,
    next_id: u64,
}

/// In-memory [`EventStore`] implementation
pub struct MemoryEventStore {
    inner: RwLock<Inner>,
    attempt_retention: Duration,
}

impl Default for MemoryEventStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryEventStore {
    /// Create a store with the default attempt retention (7 days)
    pub fn new() -> Self {
        Self::with_attempt_retention(Duration::hours(DEFAULT_ATTEMPT_RETENTION_HOURS))
    }

    /// Create a store that keeps attempt samples for `retention`
    pub fn with_attempt_retention(retention: Duration) -> Self {
        Self {
            inner: RwLock::new(Inner {
                failures: Vec::new(),
                attempts: VecDeque::new(),
                next_id: 1,
            }),
            attempt_retention: retention,
        }
    }

    /// Number of failure records currently stored
    pub fn failure_count(&self) -> usize {
        self.inner.read().expect("store lock poisoned").failures.len()
    }

    /// Number of attempt samples currently retained
    pub fn attempt_sample_count(&self) -> usize {
        self.inner.read().expect("store lock poisoned").attempts.len()
    }

    /// Drop attempt samples older than the retention window
    fn prune_attempts(inner: &mut Inner, retention: Duration) {
        let cutoff = Utc::now() - retention;
        // Samples are usually inserted in near-chronological order, but
        // out-of-order arrivals are allowed, so scan the whole deque.
        inner.attempts.retain(|sample| sample.timestamp >= cutoff);
    }
}

impl EventStore for MemoryEventStore {
    fn insert_failure(&self, event: FailureEvent) -> Result<u64, StoreError> {
        let mut inner = self
            .inner
            .write()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let id = inner.next_id;
        inner.next_id += 1;
        inner.failures.push(FailureRecord { id, event });

        Ok(id)
    }

    fn insert_attempt(&self, sample: AttemptSample) -> Result<(), StoreError> {
        let mut inner = self
            .inner
            .write()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        inner.attempts.push_back(sample);
        Self::prune_attempts(&mut inner, self.attempt_retention);

        Ok(())
    }

    fn failures(&self, filter: &EventFilter) -> Result<Vec<FailureRecord>, StoreError> {
        let inner = self
            .inner
            .read()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        Ok(inner
            .failures
            .iter()
            .filter(|record| filter.matches(record))
            .cloned()
            .collect())
    }

    fn latest_failures(
        &self,
        gateway: Option<&str>,
        min_amount: Option<f64>,
        limit: usize,
    ) -> Result<Vec<FailureRecord>, StoreError> {
        let inner = self
            .inner
            .read()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let mut matching: Vec<FailureRecord> = inner
            .failures
            .iter()
            .filter(|record| {
                gateway.map_or(true, |g| record.event.gateway == g)
                    && min_amount.map_or(true, |min| record.event.amount >= min)
            })
            .cloned()
            .collect();

        matching.sort_by(|a, b| b.event.occurred_at.cmp(&a.event.occurred_at));
        matching.truncate(limit);

        Ok(matching)
    }

    fn attempt_count(
        &self,
        gateway: Option<&str>,
        from: Timestamp,
        to: Timestamp,
    ) -> Result<u64, StoreError> {
        let inner = self
            .inner
            .read()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        Ok(inner
            .attempts
            .iter()
            .filter(|sample| {
                gateway.map_or(true, |g| sample.gateway == g)
                    && sample.timestamp >= from
                    && sample.timestamp < to
            })
            .count() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{AttemptOutcome, Metadata};

    fn failure_at(gateway: &str, amount: f64, occurred_at: Timestamp) -> FailureEvent {
        FailureEvent {
            order_id: 100,
            gateway: gateway.to_string(),
            error_code: Some("card_declined".to_string()),
            error_message: None,
            amount,
            currency: "USD".to_string(),
            customer_id: None,
            occurred_at,
            metadata: Metadata::new(),
        }
    }

    fn attempt_at(gateway: &str, timestamp: Timestamp) -> AttemptSample {
        AttemptSample {
            gateway: gateway.to_string(),
            amount: 25.0,
            outcome: AttemptOutcome::Processed,
            timestamp,
        }
    }

    #[test]
    fn test_insert_assigns_sequential_ids() {
        let store = MemoryEventStore::new();
        let now = Utc::now();

        let first = store.insert_failure(failure_at("stripe", 10.0, now)).unwrap();
        let second = store.insert_failure(failure_at("stripe", 20.0, now)).unwrap();

        assert_eq!(first, 1);
        assert_eq!(second, 2);
        assert_eq!(store.failure_count(), 2);
    }

    #[test]
    fn test_failures_half_open_range() {
        let store = MemoryEventStore::new();
        let now = Utc::now();
        let from = now - Duration::minutes(10);

        store
            .insert_failure(failure_at("stripe", 10.0, from))
            .unwrap();
        store
            .insert_failure(failure_at("stripe", 20.0, now))
            .unwrap();

        // `from` is inclusive, `to` is exclusive
        let records = store.failures(&EventFilter::range(from, now)).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].event.amount, 10.0);
    }

    #[test]
    fn test_failures_gateway_and_error_code_filters() {
        let store = MemoryEventStore::new();
        let now = Utc::now();

        store
            .insert_failure(failure_at("stripe", 10.0, now))
            .unwrap();
        let mut no_code = failure_at("paypal", 20.0, now);
        no_code.error_code = None;
        store.insert_failure(no_code).unwrap();

        let window = EventFilter::range(now - Duration::minutes(1), now + Duration::minutes(1));

        let stripe = store.failures(&window.clone().for_gateway("stripe")).unwrap();
        assert_eq!(stripe.len(), 1);
        assert_eq!(stripe[0].event.gateway, "stripe");

        let declined = store
            .failures(&window.for_error_code("card_declined"))
            .unwrap();
        assert_eq!(declined.len(), 1);
        assert_eq!(declined[0].event.gateway, "stripe");
    }

    #[test]
    fn test_latest_failures_newest_first_with_limit() {
        let store = MemoryEventStore::new();
        let now = Utc::now();

        for i in 0..5 {
            store
                .insert_failure(failure_at("stripe", 10.0 * (i + 1) as f64, now - Duration::minutes(i)))
                .unwrap();
        }

        let latest = store.latest_failures(Some("stripe"), None, 3).unwrap();
        assert_eq!(latest.len(), 3);
        // i = 0 is the newest insert
        assert_eq!(latest[0].event.amount, 10.0);
        assert_eq!(latest[1].event.amount, 20.0);
        assert_eq!(latest[2].event.amount, 30.0);
    }

    #[test]
    fn test_latest_failures_min_amount() {
        let store = MemoryEventStore::new();
        let now = Utc::now();

        store.insert_failure(failure_at("stripe", 100.0, now)).unwrap();
        store.insert_failure(failure_at("stripe", 600.0, now)).unwrap();
        store.insert_failure(failure_at("paypal", 750.0, now)).unwrap();

        let high_value = store.latest_failures(None, Some(500.0), 10).unwrap();
        assert_eq!(high_value.len(), 2);
        assert!(high_value.iter().all(|r| r.event.amount >= 500.0));
    }

    #[test]
    fn test_attempt_count_scoped_to_gateway_and_window() {
        let store = MemoryEventStore::new();
        let now = Utc::now();

        store.insert_attempt(attempt_at("stripe", now - Duration::minutes(5))).unwrap();
        store.insert_attempt(attempt_at("stripe", now - Duration::minutes(90))).unwrap();
        store.insert_attempt(attempt_at("paypal", now - Duration::minutes(5))).unwrap();

        let count = store
            .attempt_count(Some("stripe"), now - Duration::hours(1), now)
            .unwrap();
        assert_eq!(count, 1);

        let all = store
            .attempt_count(None, now - Duration::hours(1), now)
            .unwrap();
        assert_eq!(all, 2);
    }

    #[test]
    fn test_attempt_retention_prunes_old_samples() {
        let store = MemoryEventStore::with_attempt_retention(Duration::hours(2));
        let now = Utc::now();

        store.insert_attempt(attempt_at("stripe", now - Duration::hours(3))).unwrap();
        store.insert_attempt(attempt_at("stripe", now - Duration::minutes(10))).unwrap();

        // The insert of the recent sample prunes the expired one
        assert_eq!(store.attempt_sample_count(), 1);

        let count = store
            .attempt_count(Some("stripe"), now - Duration::hours(4), now)
            .unwrap();
        assert_eq!(count, 1);
    }
}
