//! Composed analytics reports
//!
//! Pull-based queries for dashboard and report collaborators, combining the
//! window aggregator and the statistics functions into a single report:
//! overview with period-over-period trends, failure timeline with anomalies,
//! per-gateway health, error breakdown with diversity, and time/amount
//! patterns.

use crate::aggregator::{AggregateBucket, GroupBy, TimeWindow, WindowAggregator};
use crate::error::QueryError;
use crate::events::{FailureRecord, Timestamp};
use crate::stats::{
    absolute_change, detect_anomalies, diversity_index, gateway_status, moving_average,
    percentage_change, performance_score, trends::DEFAULT_MOVING_AVERAGE_WINDOW, Anomaly,
    GatewayStatus, TrendChange,
};
use crate::store::{EventFilter, EventStore};
use chrono::{Datelike, Duration, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Reporting window for analytics queries
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Timeframe {
    #[serde(rename = "1h")]
    LastHour,
    #[serde(rename = "24h")]
    LastDay,
    #[serde(rename = "7d")]
    LastWeek,
    #[serde(rename = "30d")]
    LastMonth,
}

impl Timeframe {
    /// Length of the reporting window
    pub fn duration(&self) -> Duration {
        match self {
            Timeframe::LastHour => Duration::hours(1),
            Timeframe::LastDay => Duration::days(1),
            Timeframe::LastWeek => Duration::days(7),
            Timeframe::LastMonth => Duration::days(30),
        }
    }

    /// Timeline bucketing for the window length
    pub fn group_by(&self) -> GroupBy {
        match self {
            Timeframe::LastHour | Timeframe::LastDay => GroupBy::Hour,
            Timeframe::LastWeek | Timeframe::LastMonth => GroupBy::Day,
        }
    }
}

impl std::str::FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1h" => Ok(Timeframe::LastHour),
            "24h" => Ok(Timeframe::LastDay),
            "7d" => Ok(Timeframe::LastWeek),
            "30d" => Ok(Timeframe::LastMonth),
            other => Err(format!("unknown timeframe: {}", other)),
        }
    }
}

/// Aggregate metrics for one reporting period
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PeriodMetrics {
    pub total_failures: u64,
    pub total_amount_lost: f64,
    pub avg_failure_amount: f64,
    pub unique_failed_orders: u64,
    pub unique_customers: u64,
    pub total_attempts: u64,
    /// `failures / attempts * 100`; 0 when no attempts were recorded
    pub failure_rate: f64,
}

/// Period-over-period movement of the headline metrics
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OverviewTrends {
    pub failures: TrendChange,
    pub amount: TrendChange,
    pub rate: TrendChange,
    pub avg_amount: TrendChange,
}

/// Current vs previous period comparison
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Overview {
    pub current: PeriodMetrics,
    pub previous: PeriodMetrics,
    pub trends: OverviewTrends,
}

/// Failure timeline with derived statistics
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrendAnalysis {
    pub timeline: Vec<AggregateBucket>,
    pub moving_average: Vec<f64>,
    pub anomalies: Vec<Anomaly>,
}

/// Health report for one gateway
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GatewayReport {
    pub gateway: String,
    pub failure_count: u64,
    pub total_amount: f64,
    pub avg_amount: f64,
    pub unique_orders: u64,
    pub total_attempts: u64,
    pub success_rate: f64,
    pub performance_score: f64,
    pub status: GatewayStatus,
}

/// Roll-up across all reported gateways
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GatewaySummary {
    pub total_gateways: usize,
    pub total_failures: u64,
    pub total_amount_lost: f64,
    pub avg_performance_score: f64,
    pub best_performing: String,
    pub worst_performing: String,
}

/// Per-gateway breakdown, best performance score first
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GatewayAnalysis {
    pub gateways: Vec<GatewayReport>,
    pub summary: Option<GatewaySummary>,
}

/// Share of failures attributed to one error code
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorReport {
    pub error_code: String,
    pub count: u64,
    pub total_amount: f64,
    pub avg_amount: f64,
    /// Share of coded failures, in percent
    pub percentage: f64,
}

/// Error-code breakdown with diversity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorAnalysis {
    /// Most frequent error codes, highest count first (top 10)
    pub errors: Vec<ErrorReport>,
    pub total_unique_errors: usize,
    /// Normalized Shannon entropy over the full error distribution
    pub diversity_index: f64,
}

/// Failure count for one label (hour of day, weekday, amount band)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LabeledCount {
    pub label: String,
    pub count: u64,
}

/// When and at what order sizes failures cluster
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatternAnalysis {
    /// Failures per hour of day (only hours with failures, ascending)
    pub hourly: Vec<LabeledCount>,
    /// Failures per weekday (only weekdays with failures, Monday first)
    pub daily: Vec<LabeledCount>,
    pub peak_hour: Option<LabeledCount>,
    pub peak_day: Option<LabeledCount>,
    /// Failures per amount band
    pub amount_bands: Vec<LabeledCount>,
}

/// The full analytics report
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalyticsReport {
    pub overview: Overview,
    pub trends: TrendAnalysis,
    pub gateways: GatewayAnalysis,
    pub errors: ErrorAnalysis,
    pub patterns: PatternAnalysis,
}

/// Builds analytics reports from the event store
pub struct AnalyticsEngine {
    store: Arc<dyn EventStore>,
    aggregator: WindowAggregator,
}

impl AnalyticsEngine {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self {
            aggregator: WindowAggregator::new(Arc::clone(&store)),
            store,
        }
    }

    /// Build a report for the trailing timeframe, optionally filtered to one
    /// gateway
    pub fn report(
        &self,
        timeframe: Timeframe,
        gateway: Option<&str>,
    ) -> Result<AnalyticsReport, QueryError> {
        let now = Utc::now();
        let from = now - timeframe.duration();
        let prev_from = from - timeframe.duration();

        let current = self.period_metrics(from, now, gateway)?;
        let previous = self.period_metrics(prev_from, from, gateway)?;

        let trends = OverviewTrends {
            failures: percentage_change(
                current.total_failures as f64,
                previous.total_failures as f64,
            ),
            amount: percentage_change(current.total_amount_lost, previous.total_amount_lost),
            rate: absolute_change(current.failure_rate, previous.failure_rate),
            avg_amount: percentage_change(
                current.avg_failure_amount,
                previous.avg_failure_amount,
            ),
        };

        let mut timeline_query = TimeWindow::new(from, now).group_by(timeframe.group_by());
        if let Some(gateway) = gateway {
            timeline_query = timeline_query.for_gateway(gateway);
        }
        let timeline = self.aggregator.aggregate(&timeline_query)?;

        let records = self.failures_in(from, now, gateway)?;

        Ok(AnalyticsReport {
            overview: Overview {
                current,
                previous,
                trends,
            },
            trends: TrendAnalysis {
                moving_average: moving_average(&timeline, DEFAULT_MOVING_AVERAGE_WINDOW),
                anomalies: detect_anomalies(&timeline),
                timeline,
            },
            gateways: self.gateway_analysis(from, now, gateway)?,
            errors: self.error_analysis(from, now, gateway)?,
            patterns: pattern_analysis(&records),
        })
    }

    fn failures_in(
        &self,
        from: Timestamp,
        to: Timestamp,
        gateway: Option<&str>,
    ) -> Result<Vec<FailureRecord>, QueryError> {
        let mut filter = EventFilter::range(from, to);
        if let Some(gateway) = gateway {
            filter = filter.for_gateway(gateway);
        }
        Ok(self.store.failures(&filter)?)
    }

    fn period_metrics(
        &self,
        from: Timestamp,
        to: Timestamp,
        gateway: Option<&str>,
    ) -> Result<PeriodMetrics, QueryError> {
        let records = self.failures_in(from, to, gateway)?;

        let total_failures = records.len() as u64;
        let total_amount_lost: f64 = records.iter().map(|r| r.event.amount).sum();
        let avg_failure_amount = if total_failures > 0 {
            total_amount_lost / total_failures as f64
        } else {
            0.0
        };

        let unique_failed_orders = records
            .iter()
            .map(|r| r.event.order_id)
            .collect::<HashSet<_>>()
            .len() as u64;
        let unique_customers = records
            .iter()
            .filter_map(|r| r.event.customer_id)
            .collect::<HashSet<_>>()
            .len() as u64;

        let total_attempts = self.store.attempt_count(gateway, from, to)?;
        let failure_rate = if total_attempts > 0 {
            total_failures as f64 / total_attempts as f64 * 100.0
        } else {
            0.0
        };

        Ok(PeriodMetrics {
            total_failures,
            total_amount_lost,
            avg_failure_amount,
            unique_failed_orders,
            unique_customers,
            total_attempts,
            failure_rate,
        })
    }

    fn gateway_analysis(
        &self,
        from: Timestamp,
        to: Timestamp,
        gateway: Option<&str>,
    ) -> Result<GatewayAnalysis, QueryError> {
        let mut query = TimeWindow::new(from, to).group_by(GroupBy::Gateway);
        if let Some(gateway) = gateway {
            query = query.for_gateway(gateway);
        }
        let buckets = self.aggregator.aggregate(&query)?;

        let mut gateways = Vec::with_capacity(buckets.len());
        for bucket in buckets {
            let attempts = self.store.attempt_count(Some(bucket.key.as_str()), from, to)?;
            let successes = attempts.saturating_sub(bucket.failure_count);
            let success_rate = if attempts > 0 {
                successes as f64 / attempts as f64 * 100.0
            } else {
                0.0
            };

            gateways.push(GatewayReport {
                performance_score: performance_score(
                    success_rate,
                    bucket.failure_count,
                    bucket.avg_amount,
                ),
                status: gateway_status(success_rate, bucket.failure_count),
                gateway: bucket.key,
                failure_count: bucket.failure_count,
                total_amount: bucket.total_amount,
                avg_amount: bucket.avg_amount,
                unique_orders: bucket.unique_orders,
                total_attempts: attempts,
                success_rate,
            });
        }

        gateways.sort_by(|a, b| {
            b.performance_score
                .partial_cmp(&a.performance_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let summary = if gateways.is_empty() {
            None
        } else {
            let total_failures = gateways.iter().map(|g| g.failure_count).sum();
            let total_amount_lost = gateways.iter().map(|g| g.total_amount).sum();
            let avg_performance_score = gateways
                .iter()
                .map(|g| g.performance_score)
                .sum::<f64>()
                / gateways.len() as f64;

            Some(GatewaySummary {
                total_gateways: gateways.len(),
                total_failures,
                total_amount_lost,
                avg_performance_score,
                best_performing: gateways[0].gateway.clone(),
                worst_performing: gateways[gateways.len() - 1].gateway.clone(),
            })
        };

        Ok(GatewayAnalysis { gateways, summary })
    }

    fn error_analysis(
        &self,
        from: Timestamp,
        to: Timestamp,
        gateway: Option<&str>,
    ) -> Result<ErrorAnalysis, QueryError> {
        let mut query = TimeWindow::new(from, to).group_by(GroupBy::ErrorCode);
        if let Some(gateway) = gateway {
            query = query.for_gateway(gateway);
        }
        let buckets = self.aggregator.aggregate(&query)?;

        let total: u64 = buckets.iter().map(|b| b.failure_count).sum();
        let counts: Vec<u64> = buckets.iter().map(|b| b.failure_count).collect();

        let mut errors: Vec<ErrorReport> = buckets
            .into_iter()
            .map(|bucket| ErrorReport {
                percentage: if total > 0 {
                    bucket.failure_count as f64 / total as f64 * 100.0
                } else {
                    0.0
                },
                error_code: bucket.key,
                count: bucket.failure_count,
                total_amount: bucket.total_amount,
                avg_amount: bucket.avg_amount,
            })
            .collect();

        errors.sort_by(|a, b| b.count.cmp(&a.count));
        let total_unique_errors = errors.len();
        errors.truncate(10);

        Ok(ErrorAnalysis {
            errors,
            total_unique_errors,
            diversity_index: diversity_index(&counts),
        })
    }
}

const AMOUNT_BANDS: [(f64, &str); 6] = [
    (25.0, "0-25"),
    (50.0, "25-50"),
    (100.0, "50-100"),
    (250.0, "100-250"),
    (500.0, "250-500"),
    (f64::INFINITY, "500+"),
];

fn amount_band(amount: f64) -> &'static str {
    for (upper, label) in AMOUNT_BANDS {
        if amount < upper {
            return label;
        }
    }
    "500+"
}

fn pattern_analysis(records: &[FailureRecord]) -> PatternAnalysis {
    let mut hourly: HashMap<u32, u64> = HashMap::new();
    let mut daily: HashMap<usize, u64> = HashMap::new();
    let mut bands: HashMap<&'static str, u64> = HashMap::new();

    for record in records {
        *hourly.entry(record.event.occurred_at.hour()).or_default() += 1;
        *daily
            .entry(record.event.occurred_at.weekday().num_days_from_monday() as usize)
            .or_default() += 1;
        *bands.entry(amount_band(record.event.amount)).or_default() += 1;
    }

    let mut hourly: Vec<LabeledCount> = hourly
        .into_iter()
        .map(|(hour, count)| LabeledCount {
            label: format!("{:02}:00", hour),
            count,
        })
        .collect();
    hourly.sort_by(|a, b| a.label.cmp(&b.label));

    const WEEKDAYS: [&str; 7] = [
        "Monday",
        "Tuesday",
        "Wednesday",
        "Thursday",
        "Friday",
        "Saturday",
        "Sunday",
    ];
    let mut daily: Vec<LabeledCount> = daily
        .iter()
        .map(|(&day, &count)| LabeledCount {
            label: WEEKDAYS[day].to_string(),
            count,
        })
        .collect();
    daily.sort_by_key(|entry| {
        WEEKDAYS
            .iter()
            .position(|&d| d == entry.label)
            .unwrap_or(WEEKDAYS.len())
    });

    let peak_hour = hourly.iter().max_by_key(|entry| entry.count).cloned();
    let peak_day = daily.iter().max_by_key(|entry| entry.count).cloned();

    let amount_bands = AMOUNT_BANDS
        .iter()
        .filter_map(|(_, label)| {
            bands.get(label).map(|&count| LabeledCount {
                label: (*label).to_string(),
                count,
            })
        })
        .collect();

    PatternAnalysis {
        hourly,
        daily,
        peak_hour,
        peak_day,
        amount_bands,
    }
}
