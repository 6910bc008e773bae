use crate::fetcher::FetchError;

#[derive(thiserror::Error, Debug)]
pub enum TravelTimeError {
    #[error("trip {trip_id} stop path {stop_path_index}: vertex at {distance:.1} has time {time} before previous vertex time {previous_time}")]
    NonMonotonicTime {
        trip_id: String,
        stop_path_index: usize,
        distance: f64,
        time: i64,
        previous_time: i64,
    },
    #[error("trip {trip_id} stop path {stop_path_index}: distance moved back from segment {from_segment} to {to_segment}")]
    DistanceRegression {
        trip_id: String,
        stop_path_index: usize,
        from_segment: usize,
        to_segment: usize,
    },
    #[error("trip {trip_id} stop path {stop_path_index}: arrival has no stop path length")]
    MissingStopPathLength {
        trip_id: String,
        stop_path_index: usize,
    },
    #[error("trip {trip_id} stop path {stop_path_index}: negative travel time {time} msec")]
    NegativeTravelTime {
        trip_id: String,
        stop_path_index: usize,
        time: i64,
    },
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("Internal Error: {0}")]
    Internal(String),
}
