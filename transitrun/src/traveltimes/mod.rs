mod aggregator;
pub mod segment_ops;
mod travel_time_error;
mod travel_times_processor;

pub use aggregator::{AggregationCounts, TravelTimeAggregator};
pub use travel_time_error::TravelTimeError;
pub use travel_times_processor::{TravelTimesProcessor, TravelTimesResult};
