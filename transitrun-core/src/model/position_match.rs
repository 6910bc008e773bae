use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ModelError;

/// a vehicle position sample matched to a stop path, recorded while the vehicle
/// travels between a departure and the next arrival.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PositionMatch {
    pub trip_id: String,
    pub vehicle_id: String,
    pub service_id: String,
    pub stop_path_index: usize,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub time: DateTime<Utc>,
    pub distance_along_stop_path: f64,
}

impl PositionMatch {
    pub fn new(
        trip_id: &str,
        vehicle_id: &str,
        service_id: &str,
        stop_path_index: usize,
        time: DateTime<Utc>,
        distance_along_stop_path: f64,
    ) -> Result<PositionMatch, ModelError> {
        let result = PositionMatch {
            trip_id: trip_id.to_string(),
            vehicle_id: vehicle_id.to_string(),
            service_id: service_id.to_string(),
            stop_path_index,
            time,
            distance_along_stop_path,
        };
        result.validate(None)?;
        Ok(result)
    }

    /// confirms the distance lies within `[0, stop_path_length]`. the upper bound is
    /// only checked when the length of the path is known.
    pub fn validate(&self, stop_path_length: Option<f64>) -> Result<(), ModelError> {
        let d = self.distance_along_stop_path;
        let length = stop_path_length.unwrap_or(f64::INFINITY);
        if !d.is_finite() || d < 0.0 || d > length {
            return Err(ModelError::MatchOutOfBounds {
                trip_id: self.trip_id.clone(),
                distance: d,
                length,
            });
        }
        Ok(())
    }

    pub fn time_msec(&self) -> i64 {
        self.time.timestamp_millis()
    }
}
