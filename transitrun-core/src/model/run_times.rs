use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{NextTripStart, RunTimeRouteKey, RunTimeStopKey, ServiceType};

/// run time observations at one stop of a trip occurrence.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct RunTimesForStops {
    pub stop_path_id: String,
    pub stop_path_index: usize,
    pub config_rev: i32,
    pub time: DateTime<Utc>,
    pub prev_stop_departure_time: Option<DateTime<Utc>>,
    pub scheduled_time: Option<DateTime<Utc>>,
    pub scheduled_prev_stop_departure_time: Option<DateTime<Utc>>,
    /// time from the previous departure to arrival here, net of dwell
    pub run_time_msec: Option<i64>,
    pub dwell_time_msec: Option<i64>,
    pub speed: Option<f64>,
    pub last_stop: bool,
    pub time_point: bool,
}

impl RunTimesForStops {
    pub fn key(&self) -> RunTimeStopKey {
        RunTimeStopKey {
            time: self.time,
            stop_path_id: self.stop_path_id.clone(),
            stop_path_index: self.stop_path_index,
            config_rev: self.config_rev,
        }
    }
}

/// run time of one trip occurrence, created when the first matching event of the
/// occurrence is seen and completed once the first stop is reached.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct RunTimesForRoutes {
    pub config_rev: i32,
    pub trip_id: String,
    pub vehicle_id: String,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub service_id: String,
    pub route_short_name: Option<String>,
    pub direction_id: Option<String>,
    pub headsign: Option<String>,
    pub trip_pattern_id: Option<String>,
    pub scheduled_start_time_secs: Option<i64>,
    pub scheduled_end_time_secs: Option<i64>,
    pub next_trip_start: Option<NextTripStart>,
    pub service_type: Option<ServiceType>,
    /// total dwell over the trip. None when any stop in the chain was missing.
    pub dwell_time_msec: Option<i64>,
    pub start_stop_path_index: Option<usize>,
    pub actual_last_stop_path_index: Option<usize>,
    pub expected_last_stop_path_index: Option<usize>,
    /// the first stop was never reached while building this record
    pub partial: bool,
    pub run_times_for_stops: Vec<RunTimesForStops>,
}

impl RunTimesForRoutes {
    pub fn new(key: &RunTimeRouteKey) -> RunTimesForRoutes {
        RunTimesForRoutes {
            config_rev: key.config_rev,
            trip_id: key.trip_id.clone(),
            vehicle_id: key.vehicle_id.clone(),
            start_time: key.start_time,
            end_time: None,
            service_id: String::new(),
            route_short_name: None,
            direction_id: None,
            headsign: None,
            trip_pattern_id: None,
            scheduled_start_time_secs: None,
            scheduled_end_time_secs: None,
            next_trip_start: None,
            service_type: None,
            dwell_time_msec: None,
            start_stop_path_index: None,
            actual_last_stop_path_index: None,
            expected_last_stop_path_index: None,
            partial: false,
            run_times_for_stops: vec![],
        }
    }

    pub fn key(&self) -> RunTimeRouteKey {
        RunTimeRouteKey::new(
            self.config_rev,
            &self.trip_id,
            self.start_time,
            &self.vehicle_id,
        )
    }

    pub fn has_first_stop(&self) -> bool {
        self.start_stop_path_index == Some(0)
    }

    pub fn has_last_stop(&self) -> bool {
        self.actual_last_stop_path_index.is_some()
            && self.actual_last_stop_path_index == self.expected_last_stop_path_index
    }

    /// end time minus start time, when both are known.
    pub fn run_time_msec(&self) -> Option<i64> {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds()),
            _ => None,
        }
    }

    pub fn has_complete_run_time(&self) -> bool {
        self.has_first_stop() && self.has_last_stop() && self.run_time_msec().is_some()
    }

    /// scheduled end minus scheduled start, in seconds.
    pub fn scheduled_run_time_secs(&self) -> Option<i64> {
        match (self.scheduled_start_time_secs, self.scheduled_end_time_secs) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }
}
