/// Trend statistics over bucket sequences
pub mod trends;
/// Diversity, performance scoring, and status tiers
pub mod scoring;

pub use scoring::{diversity_index, gateway_status, performance_score, GatewayStatus};
pub use trends::{
    absolute_change, detect_anomalies, moving_average, percentage_change, Anomaly,
    AnomalySeverity, TrendChange, TrendDirection,
};
