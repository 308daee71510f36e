//! Windowed aggregation queries
//!
//! The [`WindowAggregator`] turns raw failure records into ordered
//! [`AggregateBucket`] sequences and answers the derived questions the rule
//! evaluator asks (recent failure counts, failure rates, gateway-down
//! detection). All queries are pure reads over the event store and operate
//! on half-open `[from, to)` windows, so out-of-order event arrival cannot
//! change a query's result.

use crate::aggregator::{AggregateBucket, GroupBy, TimeWindow};
use crate::error::QueryError;
use crate::events::FailureRecord;
use crate::store::{EventFilter, EventStore};
use chrono::{Duration, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Recency bound for consecutive-failure gateway-down detection
const GATEWAY_DOWN_WINDOW_MINUTES: i64 = 5;

struct BucketAccumulator {
    key: String,
    failure_count: u64,
    total_amount: f64,
    order_ids: HashSet<u64>,
}

impl BucketAccumulator {
    fn new(key: String) -> Self {
        Self {
            key,
            failure_count: 0,
            total_amount: 0.0,
            order_ids: HashSet::new(),
        }
    }

    fn add(&mut self, record: &FailureRecord) {
        self.failure_count += 1;
        self.total_amount += record.event.amount;
        self.order_ids.insert(record.event.order_id);
    }

    fn finish(self) -> AggregateBucket {
        let avg_amount = if self.failure_count > 0 {
            self.total_amount / self.failure_count as f64
        } else {
            0.0
        };

        AggregateBucket {
            key: self.key,
            failure_count: self.failure_count,
            total_amount: self.total_amount,
            avg_amount,
            unique_orders: self.order_ids.len() as u64,
        }
    }
}

/// Windowed aggregation over an event store
pub struct WindowAggregator {
    store: Arc<dyn EventStore>,
}

impl WindowAggregator {
    /// Create an aggregator reading from the given store
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self { store }
    }

    /// Run a windowed aggregation query
    ///
    /// Returns one bucket per group key, covering exactly the failures with
    /// `occurred_at` in `[from, to)`. Hour and day buckets are labeled by the
    /// UTC-truncated period start and ordered chronologically; gateway and
    /// error-code buckets keep first-seen insertion order. Failures without
    /// an error code are excluded from error-code grouping. An empty result
    /// is not an error.
    ///
    /// # Errors
    ///
    /// Returns `QueryError::InvalidRange` when `from > to`, or the underlying
    /// store error.
    pub fn aggregate(&self, query: &TimeWindow) -> Result<Vec<AggregateBucket>, QueryError> {
        if query.from > query.to {
            return Err(QueryError::InvalidRange {
                from: query.from,
                to: query.to,
            });
        }

        let filter = EventFilter {
            from: query.from,
            to: query.to,
            gateway: query.gateway.clone(),
            error_code: query.error_code.clone(),
        };
        let records = self.store.failures(&filter)?;

        let mut order: Vec<String> = Vec::new();
        let mut accumulators: HashMap<String, BucketAccumulator> = HashMap::new();

        for record in &records {
            let key = match bucket_key(query.group_by, record) {
                Some(key) => key,
                None => continue,
            };

            let accumulator = accumulators.entry(key.clone()).or_insert_with(|| {
                order.push(key.clone());
                BucketAccumulator::new(key)
            });
            accumulator.add(record);
        }

        let mut buckets: Vec<AggregateBucket> = order
            .into_iter()
            .filter_map(|key| accumulators.remove(&key))
            .map(BucketAccumulator::finish)
            .collect();

        // Period labels sort lexicographically in chronological order
        if matches!(query.group_by, GroupBy::Hour | GroupBy::Day) {
            buckets.sort_by(|a, b| a.key.cmp(&b.key));
        }

        Ok(buckets)
    }

    /// Count of failures for a gateway in `[now - window, now)`
    pub fn recent_failure_count(
        &self,
        gateway: &str,
        window: Duration,
    ) -> Result<u64, QueryError> {
        let now = Utc::now();
        let filter = EventFilter::range(now - window, now).for_gateway(gateway);

        Ok(self.store.failures(&filter)?.len() as u64)
    }

    /// Number of checkout attempts for a gateway in `[now - window, now)`
    pub fn attempt_count(&self, gateway: &str, window: Duration) -> Result<u64, QueryError> {
        let now = Utc::now();

        Ok(self.store.attempt_count(Some(gateway), now - window, now)?)
    }

    /// Failure rate for a gateway over the trailing window, as a percentage
    ///
    /// `failures / attempts * 100` over `[now - window, now)`. A gateway with
    /// no recorded attempts has no measurable rate, so the result is 0 rather
    /// than an error or a division fault.
    pub fn failure_rate(&self, gateway: &str, window: Duration) -> Result<f64, QueryError> {
        let attempts = self.attempt_count(gateway, window)?;
        if attempts == 0 {
            return Ok(0.0);
        }

        let failures = self.recent_failure_count(gateway, window)?;

        Ok(failures as f64 / attempts as f64 * 100.0)
    }

    /// Whether a gateway looks down based on consecutive recent failures
    ///
    /// True iff at least `consecutive` failures exist for the gateway and the
    /// most recent `consecutive` of them all occurred within the last five
    /// minutes. Fewer records mean insufficient evidence, not "down".
    pub fn is_gateway_down(&self, gateway: &str, consecutive: usize) -> Result<bool, QueryError> {
        let recent = self
            .store
            .latest_failures(Some(gateway), None, consecutive)?;

        if recent.len() < consecutive {
            return Ok(false);
        }

        let cutoff = Utc::now() - Duration::minutes(GATEWAY_DOWN_WINDOW_MINUTES);

        Ok(recent.iter().all(|record| record.event.occurred_at >= cutoff))
    }
}

fn bucket_key(group_by: GroupBy, record: &FailureRecord) -> Option<String> {
    match group_by {
        GroupBy::None => Some("total".to_string()),
        // The fixed ":00" suffix is the hour truncation
        GroupBy::Hour => Some(record.event.occurred_at.format("%Y-%m-%d %H:00").to_string()),
        GroupBy::Day => Some(record.event.occurred_at.format("%Y-%m-%d").to_string()),
        GroupBy::Gateway => Some(record.event.gateway.clone()),
        GroupBy::ErrorCode => record.event.error_code.clone(),
    }
}
