use serde::{Deserialize, Serialize};

use super::ModelError;

/// static configuration of the path leading up to one stop of a trip.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct StopPath {
    pub id: String,
    pub stop_id: String,
    pub length: f64,
    /// a time point, where schedule adherence is strictly measured.
    #[serde(default)]
    pub is_schedule_adherence_stop: bool,
}

impl StopPath {
    pub fn new(
        id: &str,
        stop_id: &str,
        length: f64,
        is_schedule_adherence_stop: bool,
    ) -> Result<StopPath, ModelError> {
        if !length.is_finite() || length < 0.0 {
            return Err(ModelError::InvalidStopPathLength {
                stop_path_id: id.to_string(),
                length,
            });
        }
        Ok(StopPath {
            id: id.to_string(),
            stop_id: stop_id.to_string(),
            length,
            is_schedule_adherence_stop,
        })
    }

    /// number of equal-length travel time segments this path divides into.
    pub fn number_of_segments(&self, max_segment_length: f64) -> usize {
        number_of_segments(self.length, max_segment_length)
    }

    pub fn segment_length(&self, max_segment_length: f64) -> f64 {
        self.length / self.number_of_segments(max_segment_length) as f64
    }
}

/// `floor(length / max_segment_length) + 1`.
pub fn number_of_segments(length: f64, max_segment_length: f64) -> usize {
    (length / max_segment_length + 1.0) as usize
}
