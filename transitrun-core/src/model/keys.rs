use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use super::{ArrivalDeparture, PositionMatch};
use crate::util::time_ops;

/// groups historical records into one occurrence of a trip driven by one vehicle.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TripOccurrenceKey {
    pub service_id: String,
    pub day_of_year: u32,
    pub trip_id: String,
    pub vehicle_id: String,
}

impl TripOccurrenceKey {
    pub fn new(
        service_id: &str,
        day_of_year: u32,
        trip_id: &str,
        vehicle_id: &str,
    ) -> TripOccurrenceKey {
        TripOccurrenceKey {
            service_id: service_id.to_string(),
            day_of_year,
            trip_id: trip_id.to_string(),
            vehicle_id: vehicle_id.to_string(),
        }
    }

    pub fn for_event(event: &ArrivalDeparture, timezone: &Tz, offset_hours: i64) -> Self {
        let day = time_ops::service_day_of_year(&event.time, timezone, offset_hours);
        Self::new(&event.service_id, day, &event.trip_id, &event.vehicle_id)
    }

    pub fn for_match(m: &PositionMatch, timezone: &Tz, offset_hours: i64) -> Self {
        let day = time_ops::service_day_of_year(&m.time, timezone, offset_hours);
        Self::new(&m.service_id, day, &m.trip_id, &m.vehicle_id)
    }
}

impl std::fmt::Display for TripOccurrenceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[service={} day={} trip={} vehicle={}]",
            self.service_id, self.day_of_year, self.trip_id, self.vehicle_id
        )
    }
}

/// identifies per-stop-path samples. the stop id detects historical data recorded
/// against an older stop configuration where the index now names a different stop.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TripStopPathKey {
    pub trip_id: String,
    pub stop_path_index: usize,
    pub stop_id: String,
}

impl TripStopPathKey {
    pub fn new(trip_id: &str, stop_path_index: usize, stop_id: &str) -> TripStopPathKey {
        TripStopPathKey {
            trip_id: trip_id.to_string(),
            stop_path_index,
            stop_id: stop_id.to_string(),
        }
    }
}

impl std::fmt::Display for TripStopPathKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[trip={} stopPathIndex={} stop={}]",
            self.trip_id, self.stop_path_index, self.stop_id
        )
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RunTimeRouteKey {
    pub config_rev: i32,
    pub trip_id: String,
    pub start_time: Option<DateTime<Utc>>,
    pub vehicle_id: String,
}

impl RunTimeRouteKey {
    pub fn new(
        config_rev: i32,
        trip_id: &str,
        start_time: Option<DateTime<Utc>>,
        vehicle_id: &str,
    ) -> RunTimeRouteKey {
        RunTimeRouteKey {
            config_rev,
            trip_id: trip_id.to_string(),
            start_time,
            vehicle_id: vehicle_id.to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RunTimeStopKey {
    pub time: DateTime<Utc>,
    pub stop_path_id: String,
    pub stop_path_index: usize,
    pub config_rev: i32,
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_early_morning_event_keys_to_previous_day() {
        let tz = chrono_tz::America::Los_Angeles;
        // 2024-03-05 01:30 local, 09:30 UTC
        let late_night = Utc.with_ymd_and_hms(2024, 3, 5, 9, 30, 0).unwrap();
        // 2024-03-04 22:00 local
        let evening = Utc.with_ymd_and_hms(2024, 3, 5, 6, 0, 0).unwrap();
        let a = ArrivalDeparture::arrival("t1", "v1", 1, late_night).with_service_id("wkdy");
        let b = ArrivalDeparture::arrival("t1", "v1", 0, evening).with_service_id("wkdy");
        assert_eq!(
            TripOccurrenceKey::for_event(&a, &tz, 3),
            TripOccurrenceKey::for_event(&b, &tz, 3)
        );
    }
}
