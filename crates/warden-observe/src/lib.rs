pub mod metrics;

pub use metrics::{Metrics, MetricsError};
