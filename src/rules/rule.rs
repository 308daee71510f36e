//! Alert rule definitions
//!
//! The six rule kinds form a closed set with strongly typed thresholds,
//! validated when configuration is loaded so a malformed rule is rejected
//! early instead of failing during evaluation.

use crate::error::ConfigError;
use crate::events::Severity;
use serde::{Deserialize, Serialize};

/// Identity of an alert rule kind
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RuleName {
    RapidFailures,
    GatewayDown,
    HighValueFailure,
    ElevatedFailureRate,
    GatewayDegradation,
    ErrorSpike,
}

impl std::fmt::Display for RuleName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RuleName::RapidFailures => "rapid_failures",
            RuleName::GatewayDown => "gateway_down",
            RuleName::HighValueFailure => "high_value_failure",
            RuleName::ElevatedFailureRate => "elevated_failure_rate",
            RuleName::GatewayDegradation => "gateway_degradation",
            RuleName::ErrorSpike => "unusual_error_spike",
        };
        write!(f, "{}", name)
    }
}

/// Trigger condition and thresholds for one rule kind
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleSpec {
    /// At least `threshold` failures for the event's gateway within the window
    RapidFailures { threshold: u32, window_seconds: i64 },
    /// `consecutive` most recent failures for the gateway all within the
    /// last five minutes
    GatewayDown { consecutive: u32 },
    /// The event is worth at least `min_amount` and the `consecutive` most
    /// recent failures at or above that amount (across all gateways) exist
    HighValueFailure { min_amount: f64, consecutive: u32 },
    /// Failure rate for the gateway at or above `rate_pct` with at least
    /// `min_attempts` checkout attempts in the window
    ElevatedFailureRate {
        rate_pct: f64,
        window_seconds: i64,
        min_attempts: u64,
    },
    /// Shorter-window, lower-threshold tier of the rate check
    GatewayDegradation {
        rate_pct: f64,
        window_seconds: i64,
        min_attempts: u64,
    },
    /// At least `threshold` failures with the event's error code in the window
    ErrorSpike { threshold: u32, window_seconds: i64 },
}

impl RuleSpec {
    /// The rule kind this spec configures
    pub fn name(&self) -> RuleName {
        match self {
            RuleSpec::RapidFailures { .. } => RuleName::RapidFailures,
            RuleSpec::GatewayDown { .. } => RuleName::GatewayDown,
            RuleSpec::HighValueFailure { .. } => RuleName::HighValueFailure,
            RuleSpec::ElevatedFailureRate { .. } => RuleName::ElevatedFailureRate,
            RuleSpec::GatewayDegradation { .. } => RuleName::GatewayDegradation,
            RuleSpec::ErrorSpike { .. } => RuleName::ErrorSpike,
        }
    }
}

fn default_enabled() -> bool {
    true
}

/// A configured alert rule
///
/// Read-only to the evaluator: each evaluation works against the config
/// snapshot it was handed, so concurrent configuration updates cannot
/// corrupt an in-flight evaluation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlertRule {
    #[serde(flatten)]
    pub spec: RuleSpec,
    pub severity: Severity,
    /// Minimum seconds before the same rule/scope may fire again
    pub cooldown_seconds: i64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl AlertRule {
    /// The rule kind this rule configures
    pub fn name(&self) -> RuleName {
        self.spec.name()
    }

    /// Validate thresholds and windows
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` naming the offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cooldown_seconds < 0 {
            return Err(ConfigError::ValidationError(format!(
                "{}: cooldown_seconds must not be negative",
                self.name()
            )));
        }

        match &self.spec {
            RuleSpec::RapidFailures {
                threshold,
                window_seconds,
            }
            | RuleSpec::ErrorSpike {
                threshold,
                window_seconds,
            } => {
                if *threshold == 0 {
                    return Err(ConfigError::ValidationError(format!(
                        "{}: threshold must be at least 1",
                        self.name()
                    )));
                }
                if *window_seconds <= 0 {
                    return Err(ConfigError::ValidationError(format!(
                        "{}: window_seconds must be positive",
                        self.name()
                    )));
                }
            }
            RuleSpec::GatewayDown { consecutive } => {
                if *consecutive == 0 {
                    return Err(ConfigError::ValidationError(format!(
                        "{}: consecutive must be at least 1",
                        self.name()
                    )));
                }
            }
            RuleSpec::HighValueFailure {
                min_amount,
                consecutive,
            } => {
                if *min_amount <= 0.0 {
                    return Err(ConfigError::ValidationError(format!(
                        "{}: min_amount must be positive",
                        self.name()
                    )));
                }
                if *consecutive == 0 {
                    return Err(ConfigError::ValidationError(format!(
                        "{}: consecutive must be at least 1",
                        self.name()
                    )));
                }
            }
            RuleSpec::ElevatedFailureRate {
                rate_pct,
                window_seconds,
                ..
            }
            | RuleSpec::GatewayDegradation {
                rate_pct,
                window_seconds,
                ..
            } => {
                if !(*rate_pct > 0.0 && *rate_pct <= 100.0) {
                    return Err(ConfigError::ValidationError(format!(
                        "{}: rate_pct must be in (0, 100]",
                        self.name()
                    )));
                }
                if *window_seconds <= 0 {
                    return Err(ConfigError::ValidationError(format!(
                        "{}: window_seconds must be positive",
                        self.name()
                    )));
                }
            }
        }

        Ok(())
    }
}

/// The production default rule set
pub fn default_rules() -> Vec<AlertRule> {
    vec![
        AlertRule {
            spec: RuleSpec::RapidFailures {
                threshold: 5,
                window_seconds: 600,
            },
            severity: Severity::Critical,
            cooldown_seconds: 1800,
            enabled: true,
        },
        AlertRule {
            spec: RuleSpec::GatewayDown { consecutive: 3 },
            severity: Severity::Critical,
            cooldown_seconds: 1800,
            enabled: true,
        },
        AlertRule {
            spec: RuleSpec::HighValueFailure {
                min_amount: 500.0,
                consecutive: 2,
            },
            severity: Severity::Critical,
            cooldown_seconds: 1800,
            enabled: true,
        },
        AlertRule {
            spec: RuleSpec::ElevatedFailureRate {
                rate_pct: 15.0,
                window_seconds: 3600,
                min_attempts: 10,
            },
            severity: Severity::Warning,
            cooldown_seconds: 3600,
            enabled: true,
        },
        AlertRule {
            spec: RuleSpec::GatewayDegradation {
                rate_pct: 25.0,
                window_seconds: 1800,
                min_attempts: 5,
            },
            severity: Severity::Warning,
            cooldown_seconds: 1800,
            enabled: true,
        },
        AlertRule {
            spec: RuleSpec::ErrorSpike {
                threshold: 3,
                window_seconds: 1800,
            },
            severity: Severity::Warning,
            cooldown_seconds: 1800,
            enabled: true,
        },
    ]
}
