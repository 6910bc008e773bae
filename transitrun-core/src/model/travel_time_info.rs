use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// derived stop and travel times for one stop path of one trip.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TravelTimeInfo {
    pub trip_id: String,
    pub stop_path_index: usize,
    pub stop_path_id: String,
    /// time spent at the stop. None when no usable samples exist.
    pub stop_time_msec: Option<i64>,
    /// per-segment travel times, empty when no usable samples exist.
    pub travel_times_msec: Vec<i64>,
    pub travel_time_segment_length: f64,
}

impl TravelTimeInfo {
    pub fn is_stop_time_valid(&self) -> bool {
        self.stop_time_msec.is_some()
    }

    pub fn is_travel_time_valid(&self) -> bool {
        !self.travel_times_msec.is_empty()
    }

    pub fn number_of_segments(&self) -> usize {
        self.travel_times_msec.len()
    }

    pub fn total_travel_time_msec(&self) -> i64 {
        self.travel_times_msec.iter().sum()
    }
}

/// travel time results keyed by (trip id, stop path index). built once per
/// processing run and read-only afterward.
#[derive(Clone, Debug, Default)]
pub struct TravelTimeInfoMap {
    entries: BTreeMap<(String, usize), TravelTimeInfo>,
}

impl TravelTimeInfoMap {
    pub fn empty() -> TravelTimeInfoMap {
        TravelTimeInfoMap::default()
    }

    pub fn add(&mut self, info: TravelTimeInfo) {
        let key = (info.trip_id.clone(), info.stop_path_index);
        if self.entries.insert(key, info).is_some() {
            log::warn!("replaced duplicate travel time info entry");
        }
    }

    pub fn get(&self, trip_id: &str, stop_path_index: usize) -> Option<&TravelTimeInfo> {
        self.entries.get(&(trip_id.to_string(), stop_path_index))
    }

    /// all entries for a trip ordered by stop path index.
    pub fn for_trip<'a>(&'a self, trip_id: &'a str) -> impl Iterator<Item = &'a TravelTimeInfo> {
        self.entries
            .values()
            .filter(move |info| info.trip_id == trip_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TravelTimeInfo> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
