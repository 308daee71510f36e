//! Alert sink boundary
//!
//! The notification collaborator implements [`AlertSink`]; the core calls
//! `deliver` once per fired rule and records the status without retrying.
//! Delivery must never block the evaluation path on external transports,
//! which is why the contract is a single synchronous call returning a status
//! rather than an acknowledgement protocol.

use crate::alerts::{AlertRecord, DeliveryStatus};
use log::info;
use std::sync::Mutex;

#[cfg(test)]
use mockall::automock;

/// Receiver for finalized alert records
#[cfg_attr(test, automock)]
pub trait AlertSink: Send + Sync {
    /// Deliver an alert record for persistence/notification
    fn deliver(&self, record: &AlertRecord) -> DeliveryStatus;
}

/// Sink that writes alerts to the application log
///
/// Useful as a default when no notification collaborator is wired up.
#[derive(Debug, Default)]
pub struct LogSink;

impl AlertSink for LogSink {
    fn deliver(&self, record: &AlertRecord) -> DeliveryStatus {
        info!(
            "[{}] {} alert: {}",
            record.rule, record.severity, record.message
        );
        DeliveryStatus::Delivered
    }
}

/// Sink that collects alerts in memory
///
/// Primarily used in tests and the replay binary to inspect what fired.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<AlertRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All records delivered so far
    pub fn records(&self) -> Vec<AlertRecord> {
        self.records.lock().expect("sink lock poisoned").clone()
    }

    /// Number of records delivered so far
    pub fn len(&self) -> usize {
        self.records.lock().expect("sink lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AlertSink for MemorySink {
    fn deliver(&self, record: &AlertRecord) -> DeliveryStatus {
        self.records
            .lock()
            .expect("sink lock poisoned")
            .push(record.clone());
        DeliveryStatus::Delivered
    }
}
