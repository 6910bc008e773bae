mod statistics;
mod statistics_error;

pub use statistics::{
    biased_filtered_mean, eliminate_outliers, filtered_mean, mean, percentile, sample_std_dev,
};
pub use statistics_error::StatisticsError;
