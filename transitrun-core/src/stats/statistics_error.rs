#[derive(thiserror::Error, Debug, PartialEq)]
pub enum StatisticsError {
    #[error("no samples provided")]
    EmptySamples,
    #[error("filter fraction must be in (0, 1], found {0}")]
    InvalidFraction(f64),
    #[error("percentile must be in [0, 100], found {0}")]
    InvalidPercentile(f64),
    #[error("sample at position {0} is not representable as a number")]
    NonNumeric(usize),
}
