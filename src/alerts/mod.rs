/// Alert record and delivery types
pub mod record;
/// Alert sink boundary and reference sinks
pub mod sink;

pub use record::{AlertRecord, DeliveryStatus};
pub use sink::{AlertSink, LogSink, MemorySink};
