use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use itertools::Itertools;
use transitrun_core::model::{
    RunTimeRouteKey, RunTimeStopKey, RunTimesForRoutes, RunTimesForStops,
};

/// run time records of many trip occurrences, keyed so that records produced
/// independently for the same occurrence merge, and per-stop entries reported more
/// than once can be detected before persistence.
#[derive(Clone, Debug, Default)]
pub struct RunTimeCache {
    routes: HashMap<RunTimeRouteKey, RunTimesForRoutes>,
    stop_counts: HashMap<RunTimeStopKey, usize>,
}

impl RunTimeCache {
    pub fn new() -> RunTimeCache {
        RunTimeCache::default()
    }

    /// the record cached for the key, created empty if absent.
    pub fn get_or_create(
        &mut self,
        config_rev: i32,
        trip_id: &str,
        start_time: Option<DateTime<Utc>>,
        vehicle_id: &str,
    ) -> &mut RunTimesForRoutes {
        let key = RunTimeRouteKey::new(config_rev, trip_id, start_time, vehicle_id);
        self.routes
            .entry(key)
            .or_insert_with_key(RunTimesForRoutes::new)
    }

    /// merges a finished record into the record cached for its key. route level
    /// fields are replaced, per-stop entries not already in the cached record are
    /// appended and counted, and dwell totals added when new entries arrive.
    /// resubmitting a record leaves the cache unchanged apart from route fields.
    pub fn absorb(&mut self, record: RunTimesForRoutes) {
        let key = record.key();
        let cached = self
            .routes
            .entry(key)
            .or_insert_with_key(RunTimesForRoutes::new);
        let fresh = cached.run_times_for_stops.is_empty();
        let known: HashSet<RunTimeStopKey> =
            cached.run_times_for_stops.iter().map(|s| s.key()).collect();
        let new_stops: Vec<RunTimesForStops> = record
            .run_times_for_stops
            .into_iter()
            .filter(|s| !known.contains(&s.key()))
            .unique_by(|s| s.key())
            .collect();
        if !fresh && new_stops.is_empty() {
            log::debug!(
                "run times of trip {} vehicle {} already cached",
                record.trip_id,
                record.vehicle_id
            );
        } else {
            cached.dwell_time_msec = match (fresh, cached.dwell_time_msec, record.dwell_time_msec) {
                (true, _, incoming) => incoming,
                (false, Some(existing), Some(incoming)) => Some(existing + incoming),
                _ => None,
            };
        }
        for stop in new_stops.iter() {
            *self.stop_counts.entry(stop.key()).or_insert(0) += 1;
        }
        cached.service_id = record.service_id;
        cached.route_short_name = record.route_short_name;
        cached.direction_id = record.direction_id;
        cached.headsign = record.headsign;
        cached.trip_pattern_id = record.trip_pattern_id;
        cached.end_time = record.end_time;
        cached.scheduled_start_time_secs = record.scheduled_start_time_secs;
        cached.scheduled_end_time_secs = record.scheduled_end_time_secs;
        cached.next_trip_start = record.next_trip_start;
        cached.service_type = record.service_type;
        cached.start_stop_path_index = record.start_stop_path_index;
        cached.actual_last_stop_path_index = record.actual_last_stop_path_index;
        cached.expected_last_stop_path_index = record.expected_last_stop_path_index;
        cached.partial = record.partial;
        cached.run_times_for_stops.extend(new_stops);
        cached
            .run_times_for_stops
            .sort_by_key(|s| (s.stop_path_index, s.time));
    }

    /// true when every per-stop entry of the record occurs at most once across the
    /// cache.
    pub fn contains_duplicate_stops(&self, record: &RunTimesForRoutes) -> bool {
        record
            .run_times_for_stops
            .iter()
            .all(|stop| self.stop_count(&stop.key()) <= 1)
    }

    /// a copy of the record keeping only per-stop entries that occur exactly once
    /// across the cache.
    pub fn deduplicate(&self, record: &RunTimesForRoutes) -> RunTimesForRoutes {
        let mut result = record.clone();
        result
            .run_times_for_stops
            .retain(|stop| self.stop_count(&stop.key()) == 1);
        let dropped = record.run_times_for_stops.len() - result.run_times_for_stops.len();
        if dropped > 0 {
            log::warn!(
                "dropped {dropped} duplicate stop entries from trip {} vehicle {}",
                record.trip_id,
                record.vehicle_id
            );
        }
        result
    }

    /// a record without a start time cannot be persisted.
    pub fn is_valid(record: &RunTimesForRoutes) -> bool {
        record.start_time.is_some()
    }

    pub fn stop_count(&self, key: &RunTimeStopKey) -> usize {
        self.stop_counts.get(key).copied().unwrap_or(0)
    }

    pub fn records(&self) -> impl Iterator<Item = &RunTimesForRoutes> {
        self.routes.values()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::TimeZone;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(secs * 1000).unwrap()
    }

    fn stop(index: usize, secs: i64) -> RunTimesForStops {
        RunTimesForStops {
            stop_path_id: format!("sp{index}"),
            stop_path_index: index,
            config_rev: 1,
            time: t(secs),
            prev_stop_departure_time: None,
            scheduled_time: None,
            scheduled_prev_stop_departure_time: None,
            run_time_msec: None,
            dwell_time_msec: Some(1000),
            speed: Some(0.0),
            last_stop: false,
            time_point: false,
        }
    }

    fn record(trip_id: &str, vehicle_id: &str, stops: Vec<RunTimesForStops>) -> RunTimesForRoutes {
        let key = RunTimeRouteKey::new(1, trip_id, Some(t(0)), vehicle_id);
        let mut r = RunTimesForRoutes::new(&key);
        r.dwell_time_msec = Some(2000);
        r.run_times_for_stops = stops;
        r
    }

    #[test]
    fn test_get_or_create_is_idempotent() {
        let mut cache = RunTimeCache::new();
        let first: *const RunTimesForRoutes = cache.get_or_create(1, "t1", Some(t(0)), "v1");
        let second: *const RunTimesForRoutes = cache.get_or_create(1, "t1", Some(t(0)), "v1");
        assert!(std::ptr::eq(first, second));
        assert_eq!(cache.len(), 1);

        cache.get_or_create(1, "t1", Some(t(0)), "v1").headsign = Some("North".to_string());
        assert_eq!(
            cache.get_or_create(1, "t1", Some(t(0)), "v1").headsign,
            Some("North".to_string())
        );
    }

    #[test]
    fn test_record_without_start_time_is_invalid() {
        let mut cache = RunTimeCache::new();
        let record = cache.get_or_create(1, "t1", None, "v1").clone();
        assert!(!RunTimeCache::is_valid(&record));
        // an empty record trivially has no repeated stops
        assert!(cache.contains_duplicate_stops(&record));
    }

    #[test]
    fn test_absorb_merges_same_occurrence() {
        let mut cache = RunTimeCache::new();
        cache.absorb(record("t1", "v1", vec![stop(2, 20), stop(3, 30)]));
        cache.absorb(record("t1", "v1", vec![stop(0, 0), stop(1, 10)]));
        assert_eq!(cache.len(), 1);
        let merged = cache.records().next().unwrap();
        assert_eq!(merged.dwell_time_msec, Some(4000));
        let idxs: Vec<usize> = merged
            .run_times_for_stops
            .iter()
            .map(|s| s.stop_path_index)
            .collect();
        assert_eq!(idxs, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_duplicate_stops_detected_and_removed() {
        let mut cache = RunTimeCache::new();
        let a = record("t1", "v1", vec![stop(0, 0), stop(1, 10)]);
        // another vehicle reported for the same stop at the same instant
        let b = record("t1", "v2", vec![stop(1, 10), stop(2, 20)]);
        cache.absorb(a.clone());
        cache.absorb(b.clone());
        assert!(!cache.contains_duplicate_stops(&a));
        assert!(!cache.contains_duplicate_stops(&b));

        let deduped = cache.deduplicate(&a);
        assert_eq!(deduped.run_times_for_stops.len(), 1);
        assert_eq!(deduped.run_times_for_stops[0].stop_path_index, 0);

        let c = record("t2", "v3", vec![stop(5, 50)]);
        cache.absorb(c.clone());
        assert!(cache.contains_duplicate_stops(&c));
        assert_eq!(cache.deduplicate(&c).run_times_for_stops.len(), 1);
    }

    #[test]
    fn test_resubmitted_record_is_not_counted_twice() {
        let mut cache = RunTimeCache::new();
        let a = record("t1", "v1", vec![stop(0, 0), stop(1, 10)]);
        cache.absorb(a.clone());
        cache.absorb(a.clone());
        let cached = cache.records().next().unwrap();
        assert_eq!(cached.run_times_for_stops.len(), 2);
        assert_eq!(cached.dwell_time_msec, Some(2000));
        assert!(cache.contains_duplicate_stops(cached));
        assert_eq!(cache.stop_count(&stop(0, 0).key()), 1);
    }
}
