//! Gateway health scoring and error diversity
//!
//! The scoring formulas intentionally stay simple enough to explain in a
//! dashboard tooltip: a success-rate base with flat penalties, and fixed
//! status tiers evaluated best-first.

use serde::{Deserialize, Serialize};

/// Health tier for a payment gateway
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GatewayStatus {
    Excellent,
    Good,
    Fair,
    Poor,
    Critical,
}

impl std::fmt::Display for GatewayStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GatewayStatus::Excellent => write!(f, "excellent"),
            GatewayStatus::Good => write!(f, "good"),
            GatewayStatus::Fair => write!(f, "fair"),
            GatewayStatus::Poor => write!(f, "poor"),
            GatewayStatus::Critical => write!(f, "critical"),
        }
    }
}

/// Normalized Shannon diversity index over error-code counts
///
/// `H = -sum(p_i * ln(p_i))` divided by `ln(distinct codes)`, landing in
/// `[0, 1]`. Defined as exactly 0 for zero or one distinct codes, where the
/// normalizer would be `ln(0)` or `ln(1)`. Zero counts carry no probability
/// mass and are skipped.
pub fn diversity_index(counts: &[u64]) -> f64 {
    let nonzero: Vec<u64> = counts.iter().copied().filter(|&c| c > 0).collect();
    if nonzero.len() < 2 {
        return 0.0;
    }

    let total: u64 = nonzero.iter().sum();
    let total = total as f64;

    let entropy: f64 = nonzero
        .iter()
        .map(|&count| {
            let p = count as f64 / total;
            -p * p.ln()
        })
        .sum();

    entropy / (nonzero.len() as f64).ln()
}

/// Gateway performance score in `[0, 100]`
///
/// Starts from the success rate, subtracts 10 for more than 50 failures or
/// 5 for more than 20, and a further 5 when the average failed amount is
/// above 100; the result is clamped to the 0-100 range.
pub fn performance_score(success_rate: f64, failure_count: u64, avg_failure_amount: f64) -> f64 {
    let mut score = success_rate;

    if failure_count > 50 {
        score -= 10.0;
    } else if failure_count > 20 {
        score -= 5.0;
    }

    if avg_failure_amount > 100.0 {
        score -= 5.0;
    }

    score.clamp(0.0, 100.0)
}

/// Gateway status tier from success rate and failure count
///
/// Tiers are evaluated best-first; the first matching tier wins.
pub fn gateway_status(success_rate: f64, failure_count: u64) -> GatewayStatus {
    if success_rate >= 98.0 && failure_count < 5 {
        GatewayStatus::Excellent
    } else if success_rate >= 95.0 && failure_count < 20 {
        GatewayStatus::Good
    } else if success_rate >= 90.0 && failure_count < 50 {
        GatewayStatus::Fair
    } else if success_rate >= 80.0 {
        GatewayStatus::Poor
    } else {
        GatewayStatus::Critical
    }
}
