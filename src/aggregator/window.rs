use crate::events::Timestamp;
use serde::{Deserialize, Serialize};

/// How to bucket failures within a time window
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum GroupBy {
    /// Single bucket covering the whole window
    #[default]
    None,
    /// One bucket per UTC hour
    Hour,
    /// One bucket per UTC day
    Day,
    /// One bucket per gateway
    Gateway,
    /// One bucket per error code; failures without a code are excluded
    ErrorCode,
}

/// A windowed aggregation query over `[from, to)`
///
/// Pure query parameter object; nothing here is persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeWindow {
    /// Inclusive lower bound
    pub from: Timestamp,
    /// Exclusive upper bound
    pub to: Timestamp,
    /// Exact-match gateway filter
    pub gateway: Option<String>,
    /// Exact-match error code filter
    pub error_code: Option<String>,
    /// Bucketing dimension
    pub group_by: GroupBy,
}

impl TimeWindow {
    /// Create a query covering `[from, to)` with a single bucket
    pub fn new(from: Timestamp, to: Timestamp) -> Self {
        Self {
            from,
            to,
            gateway: None,
            error_code: None,
            group_by: GroupBy::None,
        }
    }

    /// Set the bucketing dimension
    pub fn group_by(mut self, group_by: GroupBy) -> Self {
        self.group_by = group_by;
        self
    }

    /// Restrict the query to a single gateway
    pub fn for_gateway(mut self, gateway: impl Into<String>) -> Self {
        self.gateway = Some(gateway.into());
        self
    }

    /// Restrict the query to a single error code
    pub fn for_error_code(mut self, error_code: impl Into<String>) -> Self {
        self.error_code = Some(error_code.into());
        self
    }
}

/// Aggregated failure metrics for one bucket of a windowed query
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AggregateBucket {
    /// Period label (`2024-06-01 14:00`, `2024-06-01`) or group key
    /// (gateway id, error code); empty for `GroupBy::None`
    pub key: String,
    /// Number of failures in the bucket
    pub failure_count: u64,
    /// Sum of failed amounts
    pub total_amount: f64,
    /// Mean failed amount; 0 when the bucket is empty
    pub avg_amount: f64,
    /// Number of distinct orders among the failures
    pub unique_orders: u64,
}
