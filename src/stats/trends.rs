//! Trend statistics over ordered bucket sequences
//!
//! Pure functions consumed by the analytics composition layer. "Not enough
//! data" is never an error here: functions return an empty result instead,
//! so callers can render a report from whatever history exists.

use crate::aggregator::AggregateBucket;
use serde::{Deserialize, Serialize};

/// Default trailing window for moving averages
pub const DEFAULT_MOVING_AVERAGE_WINDOW: usize = 3;

/// Severity of a detected anomaly
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AnomalySeverity {
    /// Above mean + 2 standard deviations
    Medium,
    /// Above mean + 3 standard deviations
    High,
}

/// A bucket whose failure count sits unusually far above the mean
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Anomaly {
    /// Bucket key the anomaly was found in
    pub period: String,
    /// Observed failure count
    pub value: u64,
    /// Detection threshold (mean + 2 standard deviations)
    pub threshold: f64,
    pub severity: AnomalySeverity,
}

/// Direction of a trend change
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Up,
    Down,
    Neutral,
}

/// Kind of change a [`TrendChange`] reports
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Percentage,
    Absolute,
}

/// A current-vs-previous comparison with magnitude and direction
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrendChange {
    /// Magnitude of the change (always non-negative)
    pub value: f64,
    pub direction: TrendDirection,
    pub kind: ChangeKind,
}

/// Simple trailing moving average over bucket failure counts
///
/// Produces one value per bucket starting at index `window - 1`. Returns an
/// empty vector when fewer than `window` buckets are available.
pub fn moving_average(buckets: &[AggregateBucket], window: usize) -> Vec<f64> {
    if window == 0 || buckets.len() < window {
        return Vec::new();
    }

    let values: Vec<f64> = buckets.iter().map(|b| b.failure_count as f64).collect();

    values
        .windows(window)
        .map(|slice| slice.iter().sum::<f64>() / window as f64)
        .collect()
}

/// Detect buckets whose failure count exceeds mean + 2 standard deviations
///
/// Uses the population standard deviation across the bucket sequence.
/// Severity is `High` above mean + 3 sigma, `Medium` otherwise. Fewer than
/// 3 buckets is an insufficient sample and yields no anomalies.
pub fn detect_anomalies(buckets: &[AggregateBucket]) -> Vec<Anomaly> {
    if buckets.len() < 3 {
        return Vec::new();
    }

    let values: Vec<f64> = buckets.iter().map(|b| b.failure_count as f64).collect();
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    let std_dev = variance.sqrt();

    let threshold = mean + 2.0 * std_dev;
    let high_threshold = mean + 3.0 * std_dev;

    buckets
        .iter()
        .filter(|bucket| (bucket.failure_count as f64) > threshold)
        .map(|bucket| Anomaly {
            period: bucket.key.clone(),
            value: bucket.failure_count,
            threshold,
            severity: if (bucket.failure_count as f64) > high_threshold {
                AnomalySeverity::High
            } else {
                AnomalySeverity::Medium
            },
        })
        .collect()
}

/// Percentage change from `previous` to `current`
///
/// A zero previous value cannot be divided by; a first-time occurrence is
/// reported as a 100% increase and no occurrence at all as neutral.
pub fn percentage_change(current: f64, previous: f64) -> TrendChange {
    if previous == 0.0 {
        return TrendChange {
            value: if current > 0.0 { 100.0 } else { 0.0 },
            direction: if current > 0.0 {
                TrendDirection::Up
            } else {
                TrendDirection::Neutral
            },
            kind: ChangeKind::Percentage,
        };
    }

    let change = (current - previous) / previous * 100.0;

    TrendChange {
        value: change.abs(),
        direction: direction_of(change),
        kind: ChangeKind::Percentage,
    }
}

/// Absolute change from `previous` to `current`
pub fn absolute_change(current: f64, previous: f64) -> TrendChange {
    let change = current - previous;

    TrendChange {
        value: change.abs(),
        direction: direction_of(change),
        kind: ChangeKind::Absolute,
    }
}

fn direction_of(change: f64) -> TrendDirection {
    if change > 0.0 {
        TrendDirection::Up
    } else if change < 0.0 {
        TrendDirection::Down
    } else {
        TrendDirection::Neutral
    }
}


// Property-based tests
#[cfg(test)]
mod property_tests {
    use super::*;
    use quickcheck_macros::quickcheck;

    #[quickcheck]
    fn prop_percentage_change_identical_values_neutral(value: u32) -> bool {
        let v = value as f64;
        if v == 0.0 {
            return true; // covered by the zero-previous rule
        }
        let change = percentage_change(v, v);
        change.value == 0.0 && change.direction == TrendDirection::Neutral
    }

    #[quickcheck]
    fn prop_percentage_change_magnitude_non_negative(current: u32, previous: u32) -> bool {
        percentage_change(current as f64, previous as f64).value >= 0.0
    }

    #[quickcheck]
    fn prop_moving_average_len(counts: Vec<u8>) -> bool {
        let buckets: Vec<AggregateBucket> = counts
            .iter()
            .enumerate()
            .map(|(i, &c)| AggregateBucket {
                key: format!("b{}", i),
                failure_count: c as u64,
                total_amount: 0.0,
                avg_amount: 0.0,
                unique_orders: 0,
            })
            .collect();

        let window = DEFAULT_MOVING_AVERAGE_WINDOW;
        let avg = moving_average(&buckets, window);

        if buckets.len() < window {
            avg.is_empty()
        } else {
            avg.len() == buckets.len() - window + 1
        }
    }

    #[quickcheck]
    fn prop_fewer_than_three_buckets_never_anomalous(a: u8, b: u8) -> bool {
        let buckets = vec![
            AggregateBucket {
                key: "a".to_string(),
                failure_count: a as u64,
                total_amount: 0.0,
                avg_amount: 0.0,
                unique_orders: 0,
            },
            AggregateBucket {
                key: "b".to_string(),
                failure_count: b as u64,
                total_amount: 0.0,
                avg_amount: 0.0,
                unique_orders: 0,
            },
        ];

        detect_anomalies(&buckets[..1]).is_empty() && detect_anomalies(&buckets).is_empty()
    }
}
