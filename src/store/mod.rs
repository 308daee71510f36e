/// Event store contract and in-memory implementation
pub mod memory;

pub use memory::MemoryEventStore;

use crate::error::StoreError;
use crate::events::{AttemptSample, FailureEvent, FailureRecord, Timestamp};

/// Filter for failure queries over a half-open time range `[from, to)`
#[derive(Debug, Clone, PartialEq)]
pub struct EventFilter {
    /// Inclusive lower bound
    pub from: Timestamp,
    /// Exclusive upper bound
    pub to: Timestamp,
    /// Exact-match gateway filter
    pub gateway: Option<String>,
    /// Exact-match error code filter
    pub error_code: Option<String>,
}

impl EventFilter {
    /// Create a filter covering `[from, to)` with no field filters
    pub fn range(from: Timestamp, to: Timestamp) -> Self {
        Self {
            from,
            to,
            gateway: None,
            error_code: None,
        }
    }

    /// Restrict the filter to a single gateway
    pub fn for_gateway(mut self, gateway: impl Into<String>) -> Self {
        self.gateway = Some(gateway.into());
        self
    }

    /// Restrict the filter to a single error code
    pub fn for_error_code(mut self, error_code: impl Into<String>) -> Self {
        self.error_code = Some(error_code.into());
        self
    }

    /// Check whether a stored failure matches this filter
    pub fn matches(&self, record: &FailureRecord) -> bool {
        let event = &record.event;

        if event.occurred_at < self.from || event.occurred_at >= self.to {
            return false;
        }

        if let Some(ref gateway) = self.gateway {
            if event.gateway != *gateway {
                return false;
            }
        }

        if let Some(ref error_code) = self.error_code {
            if event.error_code.as_deref() != Some(error_code.as_str()) {
                return false;
            }
        }

        true
    }
}

/// Storage boundary for failure events and attempt samples
///
/// The monitor core depends on this query contract only; the backing storage
/// (database, message log, in-memory buffer) is the collaborator's choice.
/// Failures are append-only from the core's perspective: nothing in this
/// crate updates or deletes them, retention is the storage owner's job.
pub trait EventStore: Send + Sync {
    /// Append a failure event, returning the assigned id
    fn insert_failure(&self, event: FailureEvent) -> Result<u64, StoreError>;

    /// Append an attempt sample
    fn insert_attempt(&self, sample: AttemptSample) -> Result<(), StoreError>;

    /// All failures matching the filter, in insertion order
    fn failures(&self, filter: &EventFilter) -> Result<Vec<FailureRecord>, StoreError>;

    /// The most recent failures, newest first, optionally restricted to a
    /// gateway and/or a minimum amount
    fn latest_failures(
        &self,
        gateway: Option<&str>,
        min_amount: Option<f64>,
        limit: usize,
    ) -> Result<Vec<FailureRecord>, StoreError>;

    /// Number of attempt samples within `[from, to)`, optionally restricted
    /// to one gateway
    fn attempt_count(
        &self,
        gateway: Option<&str>,
        from: Timestamp,
        to: Timestamp,
    ) -> Result<u64, StoreError>;
}
