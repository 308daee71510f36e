//! Monitor configuration
//!
//! Loaded from TOML by the settings collaborator and validated before use so
//! malformed rules are rejected at load time rather than at evaluation time.
//! Configuration is hot-reloadable: the monitor swaps the active snapshot
//! between evaluations (see [`crate::monitor::PaymentMonitor::update_config`]).

use crate::error::ConfigError;
use crate::rules::rule::default_rules;
use crate::rules::{AlertRule, RuleName};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

fn default_attempt_retention_hours() -> i64 {
    168
}

/// Top-level configuration for a [`crate::monitor::PaymentMonitor`]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonitorConfig {
    /// Gateways to monitor; an empty list means every gateway
    #[serde(default)]
    pub monitored_gateways: Vec<String>,

    /// How long attempt samples are retained for rate denominators
    #[serde(default = "default_attempt_retention_hours")]
    pub attempt_retention_hours: i64,

    /// The alert rule set, at most one rule per kind
    #[serde(default = "default_rules")]
    pub rules: Vec<AlertRule>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            monitored_gateways: Vec::new(),
            attempt_retention_hours: default_attempt_retention_hours(),
            rules: default_rules(),
        }
    }
}

impl MonitorConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: MonitorConfig = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ConfigError::ReadError(format!("{}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&contents)
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` for a non-positive retention
    /// window, an invalid rule, or two rules of the same kind (cooldown
    /// identity is per kind and scope, so duplicate kinds would fight over
    /// the same cooldown entries).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.attempt_retention_hours <= 0 {
            return Err(ConfigError::ValidationError(
                "attempt_retention_hours must be positive".to_string(),
            ));
        }

        let mut seen: HashSet<RuleName> = HashSet::new();
        for rule in &self.rules {
            rule.validate()?;
            if !seen.insert(rule.name()) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate rule kind: {}",
                    rule.name()
                )));
            }
        }

        Ok(())
    }

    /// Whether events for a gateway should be recorded and evaluated
    pub fn is_gateway_monitored(&self, gateway: &str) -> bool {
        self.monitored_gateways.is_empty()
            || self.monitored_gateways.iter().any(|g| g == gateway)
    }
}
