#[derive(thiserror::Error, Debug)]
pub enum ModelError {
    #[error("invalid stop path index {index} for trip {trip_id}: {message}")]
    InvalidStopPathIndex {
        trip_id: String,
        index: i64,
        message: String,
    },
    #[error("invalid stop path length for {stop_path_id}: {length}")]
    InvalidStopPathLength { stop_path_id: String, length: f64 },
    #[error("match for trip {trip_id} at distance {distance} lies outside stop path of length {length}")]
    MatchOutOfBounds {
        trip_id: String,
        distance: f64,
        length: f64,
    },
    #[error("trip {trip_id} replays stop path index {next} after {previous}")]
    NonMonotonicIndex {
        trip_id: String,
        previous: usize,
        next: usize,
    },
    #[error("unable to parse numeric field '{field}' from '{value}': {message}")]
    NumericParse {
        field: String,
        value: String,
        message: String,
    },
    #[error("unknown arrival/departure kind '{0}'")]
    UnknownKind(String),
    #[error("{0}")]
    InvalidData(String),
}
