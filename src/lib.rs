/// Error types for the payment monitor
pub mod error;

/// Core event and data types
pub mod events;

/// Event store boundary and in-memory implementation
pub mod store;

/// Windowed aggregation over the event store
pub mod aggregator;

/// Statistics over aggregated buckets
pub mod stats;

/// Alert rules and the per-event evaluator
pub mod rules;

/// Alert records and sink boundary
pub mod alerts;

/// Monitor configuration
pub mod config;

/// Composed analytics reports
pub mod analytics;

/// Monitor facade wiring the components together
pub mod monitor;

// Re-export commonly used types
pub use config::MonitorConfig;
pub use error::{ConfigError, MonitorError, QueryError, StoreError};
pub use monitor::PaymentMonitor;
