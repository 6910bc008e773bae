use std::collections::HashMap;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use super::StopPath;

/// read-only configuration of one scheduled trip, assumed stable for the duration of
/// a processing run.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TripConfig {
    pub trip_id: String,
    #[serde(default)]
    pub config_rev: i32,
    pub service_id: String,
    #[serde(default)]
    pub route_id: String,
    #[serde(default)]
    pub route_short_name: Option<String>,
    #[serde(default)]
    pub direction_id: Option<String>,
    #[serde(default)]
    pub headsign: Option<String>,
    #[serde(default)]
    pub trip_pattern_id: Option<String>,
    #[serde(default)]
    pub block_id: Option<String>,
    /// scheduled start, seconds into the service day
    pub start_time_secs: i64,
    /// scheduled end, seconds into the service day
    pub end_time_secs: i64,
    pub stop_paths: Vec<StopPath>,
}

impl TripConfig {
    pub fn number_of_stop_paths(&self) -> usize {
        self.stop_paths.len()
    }

    pub fn stop_path(&self, index: usize) -> Option<&StopPath> {
        self.stop_paths.get(index)
    }

    pub fn last_stop_path_index(&self) -> Option<usize> {
        self.stop_paths.len().checked_sub(1)
    }
}

/// start of the next trip served by the same block.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum NextTripStart {
    /// scheduled start, seconds into the service day
    Scheduled(i64),
    /// the trip is the last one of its block
    NotApplicable,
    /// the next trip could not be determined
    Unavailable(String),
}

impl NextTripStart {
    pub fn scheduled_secs(&self) -> Option<i64> {
        match self {
            NextTripStart::Scheduled(secs) => Some(*secs),
            _ => None,
        }
    }
}

/// provides trip and stop path configuration by trip id.
pub trait TripConfigProvider: Sync {
    fn get_trip(&self, trip_id: &str) -> Option<&TripConfig>;

    fn next_trip_start(&self, trip: &TripConfig) -> NextTripStart;

    fn stop_path(&self, trip_id: &str, stop_path_index: usize) -> Option<&StopPath> {
        self.get_trip(trip_id)
            .and_then(|trip| trip.stop_path(stop_path_index))
    }
}

#[derive(Clone, Debug, Default)]
pub struct InMemoryTripConfigProvider {
    trips: HashMap<String, TripConfig>,
}

impl InMemoryTripConfigProvider {
    pub fn new(trips: Vec<TripConfig>) -> InMemoryTripConfigProvider {
        let trips = trips
            .into_iter()
            .map(|trip| (trip.trip_id.clone(), trip))
            .collect();
        InMemoryTripConfigProvider { trips }
    }

    pub fn len(&self) -> usize {
        self.trips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trips.is_empty()
    }
}

impl TripConfigProvider for InMemoryTripConfigProvider {
    fn get_trip(&self, trip_id: &str) -> Option<&TripConfig> {
        self.trips.get(trip_id)
    }

    fn next_trip_start(&self, trip: &TripConfig) -> NextTripStart {
        let block_id = match &trip.block_id {
            Some(b) => b,
            None => {
                return NextTripStart::Unavailable(format!(
                    "trip {} has no block assignment",
                    trip.trip_id
                ))
            }
        };
        let next = self
            .trips
            .values()
            .filter(|t| t.block_id.as_ref() == Some(block_id) && t.service_id == trip.service_id)
            .filter(|t| t.start_time_secs > trip.start_time_secs)
            .sorted_by_key(|t| t.start_time_secs)
            .next();
        match next {
            Some(t) => NextTripStart::Scheduled(t.start_time_secs),
            None => NextTripStart::NotApplicable,
        }
    }
}
