/// Windowed aggregation over the event store
pub mod window;
pub mod window_aggregator;

pub use window::{AggregateBucket, GroupBy, TimeWindow};
pub use window_aggregator::WindowAggregator;
