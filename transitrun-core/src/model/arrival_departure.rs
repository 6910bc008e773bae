use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ModelError;
use crate::util::numeric_deserialization_ops::deserialize_optional_f64;

/// whether an event marks a vehicle arriving at, or departing from, the stop at the
/// end of a stop path.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ArrivalDepartureKind {
    Arrival,
    Departure,
}

impl ArrivalDepartureKind {
    /// departures sort before arrivals when time and stop path index are equal.
    fn rank(&self) -> u8 {
        match self {
            ArrivalDepartureKind::Departure => 0,
            ArrivalDepartureKind::Arrival => 1,
        }
    }
}

impl std::fmt::Display for ArrivalDepartureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArrivalDepartureKind::Arrival => write!(f, "arrival"),
            ArrivalDepartureKind::Departure => write!(f, "departure"),
        }
    }
}

impl TryFrom<&str> for ArrivalDepartureKind {
    type Error = ModelError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_lowercase().as_str() {
            "arrival" | "a" => Ok(Self::Arrival),
            "departure" | "d" => Ok(Self::Departure),
            other => Err(ModelError::UnknownKind(other.to_string())),
        }
    }
}

/// an immutable arrival or departure of a vehicle at a stop, produced upstream by
/// map-matching. times are UTC and serialized as epoch milliseconds.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ArrivalDeparture {
    pub kind: ArrivalDepartureKind,
    pub trip_id: String,
    pub vehicle_id: String,
    pub service_id: String,
    #[serde(default)]
    pub route_id: String,
    #[serde(default)]
    pub stop_id: String,
    #[serde(default)]
    pub stop_path_id: String,
    pub stop_path_index: usize,
    #[serde(default)]
    pub config_rev: i32,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub time: DateTime<Utc>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub scheduled_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub dwell_time_msec: Option<i64>,
    #[serde(default, deserialize_with = "deserialize_optional_f64")]
    pub stop_path_length: Option<f64>,
}

impl ArrivalDeparture {
    pub fn new(
        kind: ArrivalDepartureKind,
        trip_id: &str,
        vehicle_id: &str,
        stop_path_index: usize,
        time: DateTime<Utc>,
    ) -> ArrivalDeparture {
        ArrivalDeparture {
            kind,
            trip_id: trip_id.to_string(),
            vehicle_id: vehicle_id.to_string(),
            service_id: String::new(),
            route_id: String::new(),
            stop_id: String::new(),
            stop_path_id: String::new(),
            stop_path_index,
            config_rev: 0,
            time,
            scheduled_time: None,
            dwell_time_msec: None,
            stop_path_length: None,
        }
    }

    pub fn arrival(
        trip_id: &str,
        vehicle_id: &str,
        stop_path_index: usize,
        time: DateTime<Utc>,
    ) -> ArrivalDeparture {
        Self::new(
            ArrivalDepartureKind::Arrival,
            trip_id,
            vehicle_id,
            stop_path_index,
            time,
        )
    }

    pub fn departure(
        trip_id: &str,
        vehicle_id: &str,
        stop_path_index: usize,
        time: DateTime<Utc>,
    ) -> ArrivalDeparture {
        Self::new(
            ArrivalDepartureKind::Departure,
            trip_id,
            vehicle_id,
            stop_path_index,
            time,
        )
    }

    pub fn with_service_id(mut self, service_id: &str) -> Self {
        self.service_id = service_id.to_string();
        self
    }

    pub fn with_route_id(mut self, route_id: &str) -> Self {
        self.route_id = route_id.to_string();
        self
    }

    pub fn with_stop(mut self, stop_id: &str, stop_path_id: &str) -> Self {
        self.stop_id = stop_id.to_string();
        self.stop_path_id = stop_path_id.to_string();
        self
    }

    pub fn with_config_rev(mut self, config_rev: i32) -> Self {
        self.config_rev = config_rev;
        self
    }

    pub fn with_scheduled_time(mut self, scheduled_time: DateTime<Utc>) -> Self {
        self.scheduled_time = Some(scheduled_time);
        self
    }

    pub fn with_dwell_time(mut self, dwell_time_msec: i64) -> Result<Self, ModelError> {
        if dwell_time_msec < 0 {
            return Err(ModelError::InvalidData(format!(
                "dwell time for trip {} at stop path index {} is negative: {dwell_time_msec}",
                self.trip_id, self.stop_path_index
            )));
        }
        self.dwell_time_msec = Some(dwell_time_msec);
        Ok(self)
    }

    pub fn with_stop_path_length(mut self, length: f64) -> Result<Self, ModelError> {
        if !length.is_finite() || length < 0.0 {
            return Err(ModelError::InvalidStopPathLength {
                stop_path_id: self.stop_path_id.clone(),
                length,
            });
        }
        self.stop_path_length = Some(length);
        Ok(self)
    }

    /// checks an event read from an external source.
    pub fn validate(&self) -> Result<(), ModelError> {
        if let Some(length) = self.stop_path_length {
            if !length.is_finite() || length < 0.0 {
                return Err(ModelError::InvalidStopPathLength {
                    stop_path_id: self.stop_path_id.clone(),
                    length,
                });
            }
        }
        if let Some(dwell) = self.dwell_time_msec {
            if dwell < 0 {
                return Err(ModelError::InvalidData(format!(
                    "dwell time for trip {} at stop path index {} is negative: {dwell}",
                    self.trip_id, self.stop_path_index
                )));
            }
        }
        Ok(())
    }

    pub fn is_arrival(&self) -> bool {
        self.kind == ArrivalDepartureKind::Arrival
    }

    pub fn is_departure(&self) -> bool {
        self.kind == ArrivalDepartureKind::Departure
    }

    pub fn time_msec(&self) -> i64 {
        self.time.timestamp_millis()
    }

    pub fn scheduled_time_msec(&self) -> Option<i64> {
        self.scheduled_time.map(|t| t.timestamp_millis())
    }

    /// true if this event was reported for the given trip and vehicle.
    pub fn matches_trip(&self, trip_id: &str, vehicle_id: &str) -> bool {
        self.trip_id == trip_id && self.vehicle_id == vehicle_id
    }

    /// total ordering over (time, stop path index, kind).
    pub fn chronological_cmp(&self, other: &ArrivalDeparture) -> Ordering {
        self.time
            .cmp(&other.time)
            .then(self.stop_path_index.cmp(&other.stop_path_index))
            .then(self.kind.rank().cmp(&other.kind.rank()))
    }
}

impl std::fmt::Display for ArrivalDeparture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} trip={} vehicle={} stopPathIndex={} time={}",
            self.kind,
            self.trip_id,
            self.vehicle_id,
            self.stop_path_index,
            self.time.to_rfc3339()
        )
    }
}

/// confirms the events of one trip occurrence, once placed in forward chronological
/// order, never step back to an earlier stop path.
pub fn validate_trip_sequence(events: &[ArrivalDeparture]) -> Result<(), ModelError> {
    let mut sorted: Vec<&ArrivalDeparture> = events.iter().collect();
    sorted.sort_by(|a, b| a.chronological_cmp(b));
    for pair in sorted.windows(2) {
        let (prev, next) = (pair[0], pair[1]);
        if next.stop_path_index < prev.stop_path_index {
            return Err(ModelError::NonMonotonicIndex {
                trip_id: next.trip_id.clone(),
                previous: prev.stop_path_index,
                next: next.stop_path_index,
            });
        }
    }
    Ok(())
}
