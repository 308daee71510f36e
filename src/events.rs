//! Core event types for the payment failure monitor
//!
//! This module defines the fundamental data structures used throughout the crate
//! for representing payment failures, checkout attempts, and related types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Timestamp type for consistent time handling across the application
pub type Timestamp = DateTime<Utc>;

/// Opaque key/value map attached to events and alert records
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// A payment failure captured from the checkout flow
///
/// Represents a single failed payment as reported by the ingestion boundary.
/// The store assigns an id on insert (see [`FailureRecord`]); the event itself
/// is never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FailureEvent {
    /// Order the failed payment belongs to
    pub order_id: u64,
    /// Payment gateway identifier (e.g. "stripe", "paypal")
    pub gateway: String,
    /// Gateway-specific error code, if one was reported
    pub error_code: Option<String>,
    /// Human-readable error message, if one was reported
    pub error_message: Option<String>,
    /// Order total in the order's currency; never negative
    pub amount: f64,
    /// Three-letter currency code
    pub currency: String,
    /// Customer id for registered customers, `None` for guests
    pub customer_id: Option<u64>,
    /// When the failure occurred. Events may arrive out of order
    /// (e.g. retried webhooks), so no ordering is assumed here.
    pub occurred_at: Timestamp,
    /// Additional context captured by the ingestion boundary
    #[serde(default)]
    pub metadata: Metadata,
}

/// A stored failure event together with its store-assigned id
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FailureRecord {
    /// Identifier assigned by the event store on insert
    pub id: u64,
    /// The failure event as it was ingested
    #[serde(flatten)]
    pub event: FailureEvent,
}

/// Outcome of a checkout attempt
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AttemptOutcome {
    /// Order was created but not yet processed
    Created,
    /// Checkout was processed through the gateway
    Processed,
    /// Payment completed successfully
    Success,
    /// Payment failed
    Failed,
}

/// A checkout attempt sample used as the denominator for rate calculations
///
/// One sample is recorded per checkout attempt regardless of outcome.
/// Samples expire after the store's configured retention window.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttemptSample {
    /// Payment gateway the attempt went through
    pub gateway: String,
    /// Order total for the attempt
    pub amount: f64,
    /// How the attempt ended up
    pub outcome: AttemptOutcome,
    /// When the attempt was made
    pub timestamp: Timestamp,
}

/// Severity level for alerts
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational, no action required
    Info,
    /// Warning that may require attention
    Warning,
    /// Critical issue requiring immediate attention
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_failure_event_serialization() {
        let event = FailureEvent {
            order_id: 1001,
            gateway: "stripe".to_string(),
            error_code: Some("card_declined".to_string()),
            error_message: Some("Your card was declined".to_string()),
            amount: 49.99,
            currency: "USD".to_string(),
            customer_id: Some(42),
            occurred_at: Utc::now(),
            metadata: Metadata::new(),
        };

        let json = serde_json::to_string(&event).unwrap();
        let deserialized: FailureEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event, deserialized);
    }

    #[test]
    fn test_failure_record_flattens_event_fields() {
        let record = FailureRecord {
            id: 7,
            event: FailureEvent {
                order_id: 1002,
                gateway: "paypal".to_string(),
                error_code: None,
                error_message: None,
                amount: 10.0,
                currency: "EUR".to_string(),
                customer_id: None,
                occurred_at: Utc::now(),
                metadata: Metadata::new(),
            },
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["gateway"], "paypal");
        assert_eq!(json["order_id"], 1002);
    }

    #[test]
    fn test_attempt_outcome_serialization() {
        assert_eq!(
            serde_json::to_string(&AttemptOutcome::Created).unwrap(),
            "\"created\""
        );
        assert_eq!(
            serde_json::to_string(&AttemptOutcome::Processed).unwrap(),
            "\"processed\""
        );
        assert_eq!(
            serde_json::to_string(&AttemptOutcome::Success).unwrap(),
            "\"success\""
        );
        assert_eq!(
            serde_json::to_string(&AttemptOutcome::Failed).unwrap(),
            "\"failed\""
        );
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Info < Severity::Warning);
        assert!(Severity::Warning < Severity::Critical);
        assert!(Severity::Info < Severity::Critical);
    }

    #[test]
    fn test_severity_serialization() {
        assert_eq!(serde_json::to_string(&Severity::Info).unwrap(), "\"info\"");
        assert_eq!(
            serde_json::to_string(&Severity::Warning).unwrap(),
            "\"warning\""
        );
        assert_eq!(
            serde_json::to_string(&Severity::Critical).unwrap(),
            "\"critical\""
        );
    }
}
