//! Trend detection over the normalized reading stream.

mod trend;

pub use trend::{HeartRateStatus, TrendDetector, TrendDirection, TrendState, TrendTrigger};
