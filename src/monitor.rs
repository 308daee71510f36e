//! Monitor facade
//!
//! [`PaymentMonitor`] wires the event store, window aggregator, rule
//! evaluator, and alert sink together behind the two ingestion calls the
//! checkout platform makes (`record_failure`, `record_attempt`) and the
//! query calls dashboards make. All collaborators are injected through the
//! constructor; there is no process-wide singleton state.

use crate::aggregator::{AggregateBucket, TimeWindow, WindowAggregator};
use crate::alerts::{AlertRecord, AlertSink, DeliveryStatus};
use crate::analytics::{AnalyticsEngine, AnalyticsReport, Timeframe};
use crate::config::MonitorConfig;
use crate::error::{ConfigError, MonitorError, QueryError};
use crate::events::{AttemptSample, FailureEvent};
use crate::rules::RuleEvaluator;
use crate::store::EventStore;
use chrono::Duration;
use log::{debug, error, info};
use std::sync::{Arc, RwLock};

/// Coordinates ingestion, rule evaluation, and alert delivery
pub struct PaymentMonitor {
    store: Arc<dyn EventStore>,
    aggregator: WindowAggregator,
    analytics: AnalyticsEngine,
    evaluator: RuleEvaluator,
    sink: Arc<dyn AlertSink>,
    /// Active configuration. Each evaluation takes an `Arc` snapshot, so a
    /// concurrent `update_config` never affects an evaluation in flight.
    config: RwLock<Arc<MonitorConfig>>,
}

impl PaymentMonitor {
    /// Create a monitor over the given store, configuration, and alert sink
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when the configuration fails validation.
    pub fn new(
        store: Arc<dyn EventStore>,
        config: MonitorConfig,
        sink: Arc<dyn AlertSink>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        Ok(Self {
            aggregator: WindowAggregator::new(Arc::clone(&store)),
            analytics: AnalyticsEngine::new(Arc::clone(&store)),
            evaluator: RuleEvaluator::new(Arc::clone(&store)),
            store,
            sink,
            config: RwLock::new(Arc::new(config)),
        })
    }

    /// Record a payment failure and evaluate the alert rules against it
    ///
    /// Returns the assigned event id, or `None` when the gateway is not in
    /// the monitored set. Fired alerts are handed to the sink; delivery
    /// status is logged and never retried here.
    ///
    /// # Errors
    ///
    /// Returns `MonitorError::InvalidEvent` for a negative amount or a
    /// malformed currency code, or the underlying store error.
    pub fn record_failure(&self, event: FailureEvent) -> Result<Option<u64>, MonitorError> {
        let config = self.config_snapshot();

        if !config.is_gateway_monitored(&event.gateway) {
            debug!("Ignoring failure for unmonitored gateway {}", event.gateway);
            return Ok(None);
        }

        validate_event(&event)?;

        let event_id = self.store.insert_failure(event.clone())?;
        debug!(
            "Recorded failure {} for gateway {} (order {})",
            event_id, event.gateway, event.order_id
        );

        let fired = self.evaluator.evaluate(event_id, &event, &config.rules);
        for record in fired {
            self.deliver(&record);
        }

        Ok(Some(event_id))
    }

    /// Record a checkout attempt sample
    ///
    /// # Errors
    ///
    /// Returns `MonitorError::InvalidEvent` for a negative amount, or the
    /// underlying store error.
    pub fn record_attempt(&self, sample: AttemptSample) -> Result<(), MonitorError> {
        let config = self.config_snapshot();

        if !config.is_gateway_monitored(&sample.gateway) {
            debug!(
                "Ignoring attempt for unmonitored gateway {}",
                sample.gateway
            );
            return Ok(());
        }

        if sample.amount < 0.0 {
            return Err(MonitorError::InvalidEvent(format!(
                "amount must not be negative, got {}",
                sample.amount
            )));
        }

        self.store.insert_attempt(sample)?;
        Ok(())
    }

    /// Run a windowed aggregation query
    pub fn aggregate(&self, query: &TimeWindow) -> Result<Vec<AggregateBucket>, QueryError> {
        self.aggregator.aggregate(query)
    }

    /// Failure rate for a gateway over the trailing window, in percent
    pub fn failure_rate(&self, gateway: &str, window: Duration) -> Result<f64, QueryError> {
        self.aggregator.failure_rate(gateway, window)
    }

    /// Build the composed analytics report
    pub fn analytics(
        &self,
        timeframe: Timeframe,
        gateway: Option<&str>,
    ) -> Result<AnalyticsReport, QueryError> {
        self.analytics.report(timeframe, gateway)
    }

    /// The currently active configuration snapshot
    pub fn config_snapshot(&self) -> Arc<MonitorConfig> {
        Arc::clone(&self.config.read().expect("config lock poisoned"))
    }

    /// Validate and atomically swap in a new configuration
    ///
    /// Evaluations already in flight keep the snapshot they started with.
    pub fn update_config(&self, config: MonitorConfig) -> Result<(), ConfigError> {
        config.validate()?;

        let mut active = self.config.write().expect("config lock poisoned");
        *active = Arc::new(config);
        info!("Monitor configuration updated");

        Ok(())
    }

    fn deliver(&self, record: &AlertRecord) {
        // Cooldown state was already claimed by the evaluator; a failing
        // delivery must not reopen it, so the status is only logged.
        match self.sink.deliver(record) {
            DeliveryStatus::Delivered => {
                info!("Delivered {} alert: {}", record.rule, record.message);
            }
            DeliveryStatus::Failed => {
                error!("Failed to deliver {} alert: {}", record.rule, record.message);
            }
        }
    }
}

fn validate_event(event: &FailureEvent) -> Result<(), MonitorError> {
    if event.amount < 0.0 {
        return Err(MonitorError::InvalidEvent(format!(
            "amount must not be negative, got {}",
            event.amount
        )));
    }

    if event.currency.len() != 3 || !event.currency.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(MonitorError::InvalidEvent(format!(
            "currency must be a 3-letter code, got {:?}",
            event.currency
        )));
    }

    Ok(())
}
