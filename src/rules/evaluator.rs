//! Per-event rule evaluation with cooldown-based deduplication
//!
//! The [`RuleEvaluator`] runs every enabled rule against each ingested
//! failure. Checks are independent: one event may fire zero, one, or several
//! alerts, and a store error in one check never prevents the others from
//! running. Rules that pass their threshold are then deduplicated against
//! per-scope cooldown state so bursts of near-simultaneous failures cannot
//! cause alert storms.

use crate::alerts::AlertRecord;
use crate::error::QueryError;
use crate::events::{FailureEvent, Metadata, Timestamp};
use crate::rules::{AlertRule, RuleName, RuleSpec};
use crate::store::{EventFilter, EventStore};
use crate::aggregator::WindowAggregator;
use chrono::{Duration, Utc};
use log::{info, warn};
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Cooldown identity: rule kind plus the scope it fired for
///
/// Deterministic for a given rule and scope, so repeated evaluations of the
/// same logical condition share one cooldown entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CooldownKey {
    rule: RuleName,
    /// Gateway or error code; `None` for globally scoped rules
    scope: Option<String>,
}

/// A rule check that met its threshold, before the cooldown decision
struct Triggered {
    scope: Option<String>,
    message: String,
    threshold_snapshot: Metadata,
    related_event_ids: Vec<u64>,
}

/// Evaluates alert rules against incoming failure events
pub struct RuleEvaluator {
    store: Arc<dyn EventStore>,
    aggregator: WindowAggregator,
    /// Last fire time per rule/scope. The check-and-set runs entirely under
    /// this lock, so two concurrent evaluations of the same scope cannot
    /// both pass the cooldown check.
    cooldowns: Mutex<HashMap<CooldownKey, Timestamp>>,
}

impl RuleEvaluator {
    /// Create an evaluator reading from the given store
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self {
            aggregator: WindowAggregator::new(Arc::clone(&store)),
            store,
            cooldowns: Mutex::new(HashMap::new()),
        }
    }

    /// Evaluate all rules against a newly ingested failure
    ///
    /// Returns the alert records that fired (threshold met and cooldown
    /// passed). Suppressed and failed checks are logged, never returned.
    pub fn evaluate(
        &self,
        event_id: u64,
        event: &FailureEvent,
        rules: &[AlertRule],
    ) -> Vec<AlertRecord> {
        self.evaluate_at(event_id, event, rules, Utc::now())
    }

    /// Evaluate with an explicit "now" for the cooldown decision
    ///
    /// This is primarily used for testing cooldown expiry with controlled
    /// timestamps.
    pub fn evaluate_at(
        &self,
        event_id: u64,
        event: &FailureEvent,
        rules: &[AlertRule],
        now: Timestamp,
    ) -> Vec<AlertRecord> {
        let mut fired = Vec::new();

        for rule in rules.iter().filter(|rule| rule.enabled) {
            let triggered = match self.check_rule(rule, event_id, event) {
                Ok(triggered) => triggered,
                Err(e) => {
                    // Transient store trouble: skip this rule for this event,
                    // the remaining checks still run.
                    warn!("Skipping {} check: {}", rule.name(), e);
                    continue;
                }
            };

            let Some(triggered) = triggered else {
                continue;
            };

            let key = CooldownKey {
                rule: rule.name(),
                scope: triggered.scope.clone(),
            };

            if !self.try_fire(key, Duration::seconds(rule.cooldown_seconds), now) {
                info!(
                    "Suppressed {} alert for {:?} (cooldown active)",
                    rule.name(),
                    triggered.scope
                );
                continue;
            }

            fired.push(AlertRecord {
                rule: rule.name(),
                severity: rule.severity,
                message: triggered.message,
                threshold_snapshot: triggered.threshold_snapshot,
                related_event_ids: triggered.related_event_ids,
                fired_at: now,
            });
        }

        fired
    }

    /// Atomically check the cooldown for a key and claim it when clear
    ///
    /// Returns true when the caller may fire. The last-fired timestamp is
    /// updated before any delivery happens, so a failing sink cannot reopen
    /// the window.
    fn try_fire(&self, key: CooldownKey, cooldown: Duration, now: Timestamp) -> bool {
        let mut cooldowns = self.cooldowns.lock().expect("cooldown lock poisoned");

        if let Some(last_fired) = cooldowns.get(&key) {
            if now - *last_fired < cooldown {
                return false;
            }
        }

        cooldowns.insert(key, now);
        true
    }

    fn check_rule(
        &self,
        rule: &AlertRule,
        event_id: u64,
        event: &FailureEvent,
    ) -> Result<Option<Triggered>, QueryError> {
        match &rule.spec {
            RuleSpec::RapidFailures {
                threshold,
                window_seconds,
            } => self.check_rapid_failures(event_id, event, *threshold, *window_seconds),
            RuleSpec::GatewayDown { consecutive } => {
                self.check_gateway_down(event_id, event, *consecutive)
            }
            RuleSpec::HighValueFailure {
                min_amount,
                consecutive,
            } => self.check_high_value_failure(event, *min_amount, *consecutive),
            RuleSpec::ElevatedFailureRate {
                rate_pct,
                window_seconds,
                min_attempts,
            } => self.check_failure_rate(
                RuleName::ElevatedFailureRate,
                event_id,
                event,
                *rate_pct,
                *window_seconds,
                *min_attempts,
            ),
            RuleSpec::GatewayDegradation {
                rate_pct,
                window_seconds,
                min_attempts,
            } => self.check_failure_rate(
                RuleName::GatewayDegradation,
                event_id,
                event,
                *rate_pct,
                *window_seconds,
                *min_attempts,
            ),
            RuleSpec::ErrorSpike {
                threshold,
                window_seconds,
            } => self.check_error_spike(event_id, event, *threshold, *window_seconds),
        }
    }

    fn check_rapid_failures(
        &self,
        event_id: u64,
        event: &FailureEvent,
        threshold: u32,
        window_seconds: i64,
    ) -> Result<Option<Triggered>, QueryError> {
        let recent = self
            .aggregator
            .recent_failure_count(&event.gateway, Duration::seconds(window_seconds))?;

        if recent < threshold as u64 {
            return Ok(None);
        }

        let minutes = window_seconds / 60;
        let mut snapshot = Metadata::new();
        snapshot.insert("threshold".to_string(), json!(threshold));
        snapshot.insert("actual".to_string(), json!(recent));
        snapshot.insert("window_seconds".to_string(), json!(window_seconds));
        snapshot.insert("gateway".to_string(), json!(event.gateway));

        Ok(Some(Triggered {
            scope: Some(event.gateway.clone()),
            message: format!(
                "{} payment failures detected for {} gateway in the last {} minutes",
                recent, event.gateway, minutes
            ),
            threshold_snapshot: snapshot,
            related_event_ids: vec![event_id],
        }))
    }

    fn check_gateway_down(
        &self,
        event_id: u64,
        event: &FailureEvent,
        consecutive: u32,
    ) -> Result<Option<Triggered>, QueryError> {
        if !self
            .aggregator
            .is_gateway_down(&event.gateway, consecutive as usize)?
        {
            return Ok(None);
        }

        let mut snapshot = Metadata::new();
        snapshot.insert("consecutive".to_string(), json!(consecutive));
        snapshot.insert("gateway".to_string(), json!(event.gateway));

        Ok(Some(Triggered {
            scope: Some(event.gateway.clone()),
            message: format!(
                "Gateway {} appears to be down - {} consecutive failures detected",
                event.gateway, consecutive
            ),
            threshold_snapshot: snapshot,
            related_event_ids: vec![event_id],
        }))
    }

    fn check_high_value_failure(
        &self,
        event: &FailureEvent,
        min_amount: f64,
        consecutive: u32,
    ) -> Result<Option<Triggered>, QueryError> {
        if event.amount < min_amount {
            return Ok(None);
        }

        let recent = self
            .store
            .latest_failures(None, Some(min_amount), consecutive as usize)?;

        if recent.len() < consecutive as usize {
            return Ok(None);
        }

        let total_amount: f64 = recent.iter().map(|r| r.event.amount).sum();

        let mut snapshot = Metadata::new();
        snapshot.insert("min_amount".to_string(), json!(min_amount));
        snapshot.insert("consecutive_required".to_string(), json!(consecutive));
        snapshot.insert("actual_consecutive".to_string(), json!(recent.len()));
        snapshot.insert("total_amount".to_string(), json!(total_amount));

        Ok(Some(Triggered {
            scope: None,
            message: format!(
                "{} consecutive high-value payment failures detected. Total amount: {:.2} {}",
                recent.len(),
                total_amount,
                event.currency
            ),
            threshold_snapshot: snapshot,
            related_event_ids: recent.iter().map(|r| r.id).collect(),
        }))
    }

    fn check_failure_rate(
        &self,
        name: RuleName,
        event_id: u64,
        event: &FailureEvent,
        rate_pct: f64,
        window_seconds: i64,
        min_attempts: u64,
    ) -> Result<Option<Triggered>, QueryError> {
        let window = Duration::seconds(window_seconds);

        let attempts = self.aggregator.attempt_count(&event.gateway, window)?;
        if attempts < min_attempts {
            // Too little traffic to call it a rate problem
            return Ok(None);
        }

        let rate = self.aggregator.failure_rate(&event.gateway, window)?;
        if rate < rate_pct {
            return Ok(None);
        }

        let minutes = window_seconds / 60;
        let mut snapshot = Metadata::new();
        snapshot.insert("threshold_percentage".to_string(), json!(rate_pct));
        snapshot.insert("actual_percentage".to_string(), json!(rate));
        snapshot.insert("attempts".to_string(), json!(attempts));
        snapshot.insert("window_seconds".to_string(), json!(window_seconds));
        snapshot.insert("gateway".to_string(), json!(event.gateway));

        let message = match name {
            RuleName::GatewayDegradation => format!(
                "Gateway {} performance degradation: {:.1}% failure rate in the last {} minutes",
                event.gateway, rate, minutes
            ),
            _ => format!(
                "Elevated failure rate detected for {} gateway: {:.1}% over the last {} minutes",
                event.gateway, rate, minutes
            ),
        };

        Ok(Some(Triggered {
            scope: Some(event.gateway.clone()),
            message,
            threshold_snapshot: snapshot,
            related_event_ids: vec![event_id],
        }))
    }

    fn check_error_spike(
        &self,
        event_id: u64,
        event: &FailureEvent,
        threshold: u32,
        window_seconds: i64,
    ) -> Result<Option<Triggered>, QueryError> {
        // Failures without an error code have nothing to spike on
        let Some(error_code) = &event.error_code else {
            return Ok(None);
        };

        let now = Utc::now();
        let filter = EventFilter::range(now - Duration::seconds(window_seconds), now)
            .for_error_code(error_code.clone());
        let count = self.store.failures(&filter)?.len() as u64;

        if count < threshold as u64 {
            return Ok(None);
        }

        let minutes = window_seconds / 60;
        let mut snapshot = Metadata::new();
        snapshot.insert("threshold".to_string(), json!(threshold));
        snapshot.insert("actual".to_string(), json!(count));
        snapshot.insert("error_code".to_string(), json!(error_code));
        snapshot.insert("window_seconds".to_string(), json!(window_seconds));

        Ok(Some(Triggered {
            scope: Some(error_code.clone()),
            message: format!(
                "Unusual error spike detected: \"{}\" occurred {} times in the last {} minutes",
                error_code, count, minutes
            ),
            threshold_snapshot: snapshot,
            related_event_ids: vec![event_id],
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{AttemptOutcome, AttemptSample, Metadata, Severity};
    use crate::rules::rule::default_rules;
    use crate::store::MemoryEventStore;

    fn failure(gateway: &str, amount: f64, error_code: Option<&str>) -> FailureEvent {
        FailureEvent {
            order_id: 500,
            gateway: gateway.to_string(),
            error_code: error_code.map(str::to_string),
            error_message: None,
            amount,
            currency: "USD".to_string(),
            customer_id: None,
            occurred_at: Utc::now(),
            metadata: Metadata::new(),
        }
    }

    fn ingest(store: &MemoryEventStore, event: &FailureEvent) -> u64 {
        store.insert_failure(event.clone()).unwrap()
    }

    fn rapid_failures_rule(threshold: u32, window_seconds: i64, cooldown_seconds: i64) -> AlertRule {
        AlertRule {
            spec: RuleSpec::RapidFailures {
                threshold,
                window_seconds,
            },
            severity: Severity::Critical,
            cooldown_seconds,
            enabled: true,
        }
    }

    #[test]
    fn test_rapid_failures_fires_on_fifth_and_suppresses_sixth() {
        let store = Arc::new(MemoryEventStore::new());
        let evaluator = RuleEvaluator::new(Arc::clone(&store) as Arc<dyn EventStore>);
        let rules = vec![rapid_failures_rule(5, 600, 1800)];

        let mut fired_total = 0;
        for i in 0..6 {
            let event = failure("stripe", 50.0, None);
            let id = ingest(&store, &event);
            let fired = evaluator.evaluate(id, &event, &rules);

            if i < 4 {
                assert!(fired.is_empty(), "event {} should not fire", i);
            }
            fired_total += fired.len();
        }

        // The 5th event fires, the 6th lands inside the cooldown
        assert_eq!(fired_total, 1);
    }

    #[test]
    fn test_cooldown_expiry_allows_second_alert() {
        let store = Arc::new(MemoryEventStore::new());
        let evaluator = RuleEvaluator::new(Arc::clone(&store) as Arc<dyn EventStore>);
        let rules = vec![rapid_failures_rule(2, 600, 1800)];

        for _ in 0..2 {
            let event = failure("stripe", 50.0, None);
            ingest(&store, &event);
        }

        let event = failure("stripe", 50.0, None);
        let id = ingest(&store, &event);

        let first = evaluator.evaluate(id, &event, &rules);
        assert_eq!(first.len(), 1);

        // Still in cooldown
        let second = evaluator.evaluate(id, &event, &rules);
        assert!(second.is_empty());

        // Past the cooldown window the same condition fires again
        let later = Utc::now() + Duration::seconds(1801);
        let third = evaluator.evaluate_at(id, &event, &rules, later);
        assert_eq!(third.len(), 1);
    }

    #[test]
    fn test_cooldown_scoped_per_gateway() {
        let store = Arc::new(MemoryEventStore::new());
        let evaluator = RuleEvaluator::new(Arc::clone(&store) as Arc<dyn EventStore>);
        let rules = vec![rapid_failures_rule(1, 600, 1800)];

        let stripe = failure("stripe", 50.0, None);
        let stripe_id = ingest(&store, &stripe);
        assert_eq!(evaluator.evaluate(stripe_id, &stripe, &rules).len(), 1);

        // A different gateway has its own cooldown entry
        let paypal = failure("paypal", 50.0, None);
        let paypal_id = ingest(&store, &paypal);
        assert_eq!(evaluator.evaluate(paypal_id, &paypal, &rules).len(), 1);

        // Same gateway again is suppressed
        let stripe_again = failure("stripe", 50.0, None);
        let again_id = ingest(&store, &stripe_again);
        assert!(evaluator.evaluate(again_id, &stripe_again, &rules).is_empty());
    }

    #[test]
    fn test_gateway_down_requires_consecutive_recent_failures() {
        let store = Arc::new(MemoryEventStore::new());
        let evaluator = RuleEvaluator::new(Arc::clone(&store) as Arc<dyn EventStore>);
        let rules = vec![AlertRule {
            spec: RuleSpec::GatewayDown { consecutive: 3 },
            severity: Severity::Critical,
            cooldown_seconds: 1800,
            enabled: true,
        }];

        // Two failures are insufficient evidence
        for _ in 0..2 {
            let event = failure("paypal", 20.0, None);
            let id = ingest(&store, &event);
            assert!(evaluator.evaluate(id, &event, &rules).is_empty());
        }

        let event = failure("paypal", 20.0, None);
        let id = ingest(&store, &event);
        let fired = evaluator.evaluate(id, &event, &rules);

        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].rule, RuleName::GatewayDown);
        assert!(fired[0].message.contains("paypal"));
    }

    #[test]
    fn test_high_value_failure_needs_consecutive_high_values() {
        let store = Arc::new(MemoryEventStore::new());
        let evaluator = RuleEvaluator::new(Arc::clone(&store) as Arc<dyn EventStore>);
        let rules = vec![AlertRule {
            spec: RuleSpec::HighValueFailure {
                min_amount: 500.0,
                consecutive: 2,
            },
            severity: Severity::Critical,
            cooldown_seconds: 1800,
            enabled: true,
        }];

        // One high-value failure alone does not fire
        let first = failure("stripe", 600.0, None);
        let first_id = ingest(&store, &first);
        assert!(evaluator.evaluate(first_id, &first, &rules).is_empty());

        // A low-value failure never fires this rule
        let low = failure("stripe", 40.0, None);
        let low_id = ingest(&store, &low);
        assert!(evaluator.evaluate(low_id, &low, &rules).is_empty());

        // The second high-value failure completes the pattern
        let second = failure("paypal", 800.0, None);
        let second_id = ingest(&store, &second);
        let fired = evaluator.evaluate(second_id, &second, &rules);

        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].rule, RuleName::HighValueFailure);
        assert_eq!(fired[0].related_event_ids.len(), 2);
        assert!(fired[0].message.contains("1400.00 USD"));
    }

    #[test]
    fn test_elevated_failure_rate_needs_minimum_attempts() {
        let store = Arc::new(MemoryEventStore::new());
        let evaluator = RuleEvaluator::new(Arc::clone(&store) as Arc<dyn EventStore>);
        let rules = vec![AlertRule {
            spec: RuleSpec::ElevatedFailureRate {
                rate_pct: 15.0,
                window_seconds: 3600,
                min_attempts: 10,
            },
            severity: Severity::Warning,
            cooldown_seconds: 3600,
            enabled: true,
        }];

        // 5 attempts, 2 failures: 40% rate but below the attempt floor
        for _ in 0..5 {
            store
                .insert_attempt(AttemptSample {
                    gateway: "stripe".to_string(),
                    amount: 30.0,
                    outcome: AttemptOutcome::Processed,
                    timestamp: Utc::now(),
                })
                .unwrap();
        }
        let event = failure("stripe", 30.0, None);
        ingest(&store, &event);
        let id = ingest(&store, &event);
        assert!(evaluator.evaluate(id, &event, &rules).is_empty());

        // More traffic pushes attempts past the floor while the rate stays high
        for _ in 0..5 {
            store
                .insert_attempt(AttemptSample {
                    gateway: "stripe".to_string(),
                    amount: 30.0,
                    outcome: AttemptOutcome::Processed,
                    timestamp: Utc::now(),
                })
                .unwrap();
        }
        let fired = evaluator.evaluate(id, &event, &rules);
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].rule, RuleName::ElevatedFailureRate);
    }

    #[test]
    fn test_error_spike_scoped_to_error_code() {
        let store = Arc::new(MemoryEventStore::new());
        let evaluator = RuleEvaluator::new(Arc::clone(&store) as Arc<dyn EventStore>);
        let rules = vec![AlertRule {
            spec: RuleSpec::ErrorSpike {
                threshold: 3,
                window_seconds: 1800,
            },
            severity: Severity::Warning,
            cooldown_seconds: 1800,
            enabled: true,
        }];

        // Two timeouts plus an unrelated decline: no spike yet
        for code in ["gateway_timeout", "gateway_timeout", "card_declined"] {
            let event = failure("stripe", 25.0, Some(code));
            let id = ingest(&store, &event);
            assert!(evaluator.evaluate(id, &event, &rules).is_empty());
        }

        let event = failure("stripe", 25.0, Some("gateway_timeout"));
        let id = ingest(&store, &event);
        let fired = evaluator.evaluate(id, &event, &rules);

        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].rule, RuleName::ErrorSpike);
        assert!(fired[0].message.contains("gateway_timeout"));
    }

    #[test]
    fn test_event_without_error_code_never_spikes() {
        let store = Arc::new(MemoryEventStore::new());
        let evaluator = RuleEvaluator::new(Arc::clone(&store) as Arc<dyn EventStore>);
        let rules = vec![AlertRule {
            spec: RuleSpec::ErrorSpike {
                threshold: 1,
                window_seconds: 1800,
            },
            severity: Severity::Warning,
            cooldown_seconds: 1800,
            enabled: true,
        }];

        let event = failure("stripe", 25.0, None);
        let id = ingest(&store, &event);
        assert!(evaluator.evaluate(id, &event, &rules).is_empty());
    }

    #[test]
    fn test_disabled_rule_is_skipped() {
        let store = Arc::new(MemoryEventStore::new());
        let evaluator = RuleEvaluator::new(Arc::clone(&store) as Arc<dyn EventStore>);
        let mut rule = rapid_failures_rule(1, 600, 1800);
        rule.enabled = false;

        let event = failure("stripe", 50.0, None);
        let id = ingest(&store, &event);
        assert!(evaluator.evaluate(id, &event, &[rule]).is_empty());
    }

    #[test]
    fn test_one_event_can_fire_multiple_rules() {
        let store = Arc::new(MemoryEventStore::new());
        let evaluator = RuleEvaluator::new(Arc::clone(&store) as Arc<dyn EventStore>);
        let rules = vec![
            rapid_failures_rule(3, 600, 1800),
            AlertRule {
                spec: RuleSpec::GatewayDown { consecutive: 3 },
                severity: Severity::Critical,
                cooldown_seconds: 1800,
                enabled: true,
            },
        ];

        for _ in 0..2 {
            let event = failure("stripe", 50.0, None);
            ingest(&store, &event);
        }

        let event = failure("stripe", 50.0, None);
        let id = ingest(&store, &event);
        let fired = evaluator.evaluate(id, &event, &rules);

        // Checks are independent, not short-circuited
        assert_eq!(fired.len(), 2);
        let names: Vec<RuleName> = fired.iter().map(|r| r.rule).collect();
        assert!(names.contains(&RuleName::RapidFailures));
        assert!(names.contains(&RuleName::GatewayDown));
    }

    #[test]
    fn test_default_rules_quiet_on_single_low_value_failure() {
        let store = Arc::new(MemoryEventStore::new());
        let evaluator = RuleEvaluator::new(Arc::clone(&store) as Arc<dyn EventStore>);
        let rules = default_rules();

        let event = failure("stripe", 19.99, Some("card_declined"));
        let id = ingest(&store, &event);
        assert!(evaluator.evaluate(id, &event, &rules).is_empty());
    }
}
