use crate::events::{Metadata, Severity, Timestamp};
use crate::rules::RuleName;
use serde::{Deserialize, Serialize};

/// A fired alert, ready for persistence and notification
///
/// Built by the rule evaluator once a rule passes both its threshold and its
/// cooldown check. Immutable once created; ownership transfers to the alert
/// sink.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlertRecord {
    /// Rule that fired
    pub rule: RuleName,
    pub severity: Severity,
    /// Human-readable message parameterized with actual vs threshold values
    pub message: String,
    /// The inputs that triggered the rule (thresholds, observed values, scope)
    pub threshold_snapshot: Metadata,
    /// Ids of the failure events that contributed to the alert
    pub related_event_ids: Vec<u64>,
    pub fired_at: Timestamp,
}

/// Outcome of handing an alert record to the sink
///
/// Delivery is the sink's responsibility; the core records the status but
/// never retries. Cooldown state is updated before delivery is attempted, so
/// a delivery outage cannot cause alert storms on recovery.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Delivered,
    Failed,
}
