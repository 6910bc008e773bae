use transitrun_core::model::ModelError;

use crate::cache::CacheError;

#[derive(thiserror::Error, Debug)]
pub enum RunTimeError {
    #[error("no configuration for trip {0}")]
    UnknownTrip(String),
    #[error("trip {trip_id} has no stop paths")]
    EmptyTrip { trip_id: String },
    #[error("event {event} does not belong to trip {trip_id} vehicle {vehicle_id}")]
    MismatchedEvent {
        trip_id: String,
        vehicle_id: String,
        event: String,
    },
    #[error("trip {trip_id} never arrived at its last stop path {expected_last}")]
    NoFinalArrival { trip_id: String, expected_last: usize },
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error("Internal Error: {0}")]
    Internal(String),
}
