use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use transitrun_core::{
    model::{
        ArrivalDeparture, PositionMatch, ScheduleAdherenceCalculator, ScheduledTimeAdherence,
        TravelTimeInfo, TravelTimeInfoMap, TripConfigProvider, TripStopPathKey,
    },
    stats,
};

use super::segment_ops;
use crate::config::TravelTimesConfig;

/// observability counts for one aggregation run.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct AggregationCounts {
    /// distinct (trip, stop path index, stop id) keys with samples
    pub total: usize,
    /// keys that produced a stop time or travel times
    pub matched: usize,
    /// keys whose samples were all unusable for the current configuration
    pub unmatched: usize,
    /// keys referring to an unknown trip, stop path index or a different stop
    pub invalid: usize,
}

/// accumulates stop time and travel time samples across trip occurrences. created
/// for one processing run and consumed by [`TravelTimeAggregator::build`].
pub struct TravelTimeAggregator<A = ScheduledTimeAdherence> {
    config: TravelTimesConfig,
    adherence: A,
    stop_times: HashMap<TripStopPathKey, Vec<i64>>,
    travel_times: HashMap<TripStopPathKey, Vec<Vec<i64>>>,
}

impl TravelTimeAggregator<ScheduledTimeAdherence> {
    pub fn new(config: TravelTimesConfig) -> Self {
        Self::with_adherence(config, ScheduledTimeAdherence)
    }
}

impl<A: ScheduleAdherenceCalculator> TravelTimeAggregator<A> {
    pub fn with_adherence(config: TravelTimesConfig, adherence: A) -> Self {
        TravelTimeAggregator {
            config,
            adherence,
            stop_times: HashMap::new(),
            travel_times: HashMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.stop_times.is_empty() && self.travel_times.is_empty()
    }

    pub fn stop_time_samples(&self, key: &TripStopPathKey) -> &[i64] {
        self.stop_times.get(key).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn travel_time_samples(&self, key: &TripStopPathKey) -> &[Vec<i64>] {
        self.travel_times
            .get(key)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// adds the samples of one trip occurrence. `events` must be in chronological
    /// order and `matches` are the matches of the same occurrence.
    pub fn process_trip(&mut self, events: &[ArrivalDeparture], matches: &[PositionMatch]) {
        for pair in events.windows(2) {
            let (first, second) = (&pair[0], &pair[1]);
            if first.stop_path_index == 0 {
                if first.is_arrival() {
                    continue;
                }
                self.add_first_stop_sample(first);
            }
            self.process_pair(first, second, matches);
        }
    }

    /// the first stop's stop time is how late the vehicle left relative to schedule.
    fn add_first_stop_sample(&mut self, departure: &ArrivalDeparture) {
        let scheduled = match departure.scheduled_time_msec() {
            Some(s) => s,
            None => {
                log::debug!("no scheduled time for first stop departure {departure}");
                return;
            }
        };
        let mut late_msec = departure.time_msec() - scheduled;
        if late_msec.abs() > self.config.max_sched_adh_for_first_stop_msec {
            log::debug!(
                "first stop departure {late_msec} msec off schedule exceeds limit, not sampled: {departure}"
            );
            return;
        }
        if self.config.reset_early_terminal_departures && late_msec < 0 {
            late_msec = 0;
        }
        let key = TripStopPathKey::new(&departure.trip_id, 0, &departure.stop_id);
        self.stop_times.entry(key).or_default().push(late_msec);
    }

    /// judges a pair by the adherence of its first event, or of the second when the
    /// first has no schedule.
    fn is_adherence_acceptable(&self, first: &ArrivalDeparture, second: &ArrivalDeparture) -> bool {
        let max_msec = self.config.max_schedule_adherence_secs * 1000;
        self.adherence
            .schedule_adherence(first)
            .or_else(|| self.adherence.schedule_adherence(second))
            .map(|adh| adh.is_within_bounds(max_msec, max_msec))
            .unwrap_or(true)
    }

    fn process_pair(
        &mut self,
        first: &ArrivalDeparture,
        second: &ArrivalDeparture,
        matches: &[PositionMatch],
    ) {
        if !self.is_adherence_acceptable(first, second) {
            log::trace!("schedule adherence out of bounds, skipping {first} -> {second}");
            return;
        }

        if first.is_arrival()
            && second.is_departure()
            && first.stop_path_index == second.stop_path_index
        {
            let dwell = second.time_msec() - first.time_msec();
            if dwell < 0 {
                log::error!("negative dwell time {dwell} msec between {first} and {second}");
                return;
            }
            let key = TripStopPathKey::new(
                &second.trip_id,
                second.stop_path_index,
                &second.stop_id,
            );
            self.stop_times.entry(key).or_default().push(dwell);
        } else if first.is_departure()
            && second.is_arrival()
            && second.stop_path_index == first.stop_path_index + 1
        {
            match segment_ops::determine_travel_times(first, second, matches, &self.config) {
                Ok(times) if times.iter().any(|t| *t < 0) => {
                    log::error!("negative segment time {times:?} between {first} and {second}");
                }
                Ok(times) => {
                    let key = TripStopPathKey::new(
                        &second.trip_id,
                        second.stop_path_index,
                        &second.stop_id,
                    );
                    self.travel_times.entry(key).or_default().push(times);
                }
                Err(e) => {
                    log::error!("discarding travel times between {first} and {second}: {e}");
                }
            }
        }
    }

    /// reduces the accumulated samples into travel time info for the current trip
    /// configuration.
    pub fn build(&self, provider: &dyn TripConfigProvider) -> (TravelTimeInfoMap, AggregationCounts) {
        let mut map = TravelTimeInfoMap::empty();
        let mut counts = AggregationCounts::default();
        if self.is_empty() {
            log::error!("no stop time or travel time samples, nothing to do");
            return (map, counts);
        }

        let keys: BTreeSet<&TripStopPathKey> = self
            .stop_times
            .keys()
            .chain(self.travel_times.keys())
            .collect();
        counts.total = keys.len();

        for key in keys {
            let trip = match provider.get_trip(&key.trip_id) {
                Some(trip) => trip,
                None => {
                    log::warn!("no trip configuration for {key}, samples ignored");
                    counts.invalid += 1;
                    continue;
                }
            };
            let stop_path = match trip.stop_path(key.stop_path_index) {
                Some(sp) => sp,
                None => {
                    log::warn!(
                        "stop path index out of range for {key}, trip has {} stop paths",
                        trip.number_of_stop_paths()
                    );
                    counts.invalid += 1;
                    continue;
                }
            };
            if stop_path.stop_id != key.stop_id {
                log::warn!(
                    "{key} refers to stop {} in the current configuration, samples ignored",
                    stop_path.stop_id
                );
                counts.invalid += 1;
                continue;
            }

            let max_length = self.config.max_travel_time_segment_length;
            let n_segments = stop_path.number_of_segments(max_length);
            let travel_times_msec = self.segment_means(key, n_segments);
            let stop_time_msec = self.stop_time(key);

            if stop_time_msec.is_none() && travel_times_msec.is_empty() {
                counts.unmatched += 1;
            } else {
                counts.matched += 1;
            }
            map.add(TravelTimeInfo {
                trip_id: key.trip_id.clone(),
                stop_path_index: key.stop_path_index,
                stop_path_id: stop_path.id.clone(),
                stop_time_msec,
                travel_times_msec,
                travel_time_segment_length: stop_path.segment_length(max_length),
            });
        }
        log::info!(
            "built {} travel time entries: total={} matched={} unmatched={} invalid={}",
            map.len(),
            counts.total,
            counts.matched,
            counts.unmatched,
            counts.invalid
        );
        (map, counts)
    }

    /// filtered mean of each segment over the samples whose segment count matches
    /// the current configuration. empty if none match.
    fn segment_means(&self, key: &TripStopPathKey, n_segments: usize) -> Vec<i64> {
        let samples: Vec<&Vec<i64>> = self
            .travel_time_samples(key)
            .iter()
            .filter(|times| times.len() == n_segments)
            .collect();
        let stale = self.travel_time_samples(key).len() - samples.len();
        if stale > 0 {
            log::debug!("{key}: ignoring {stale} samples recorded with a different segment count");
        }
        if samples.is_empty() {
            return vec![];
        }
        let fraction = self.config.fraction_limit_for_travel_times;
        let mut result = Vec::with_capacity(n_segments);
        for segment in 0..n_segments {
            let column: Vec<i64> = samples.iter().map(|times| times[segment]).collect();
            match stats::filtered_mean(&column, fraction) {
                Ok(mean) => result.push(mean.round() as i64),
                Err(e) => {
                    log::error!("{key}: failed computing travel time for segment {segment}: {e}");
                    return vec![];
                }
            }
        }
        result
    }

    fn stop_time(&self, key: &TripStopPathKey) -> Option<i64> {
        let samples = self.stop_time_samples(key);
        if samples.is_empty() {
            return None;
        }
        let fraction = self.config.fraction_limit_for_stop_times;
        let result = if key.stop_path_index == 0 {
            stats::biased_filtered_mean(samples, fraction, self.config.std_dev_bias_for_first_stop)
                .map(|mean| {
                    let biased = mean.round() as i64 - self.config.stop_time_bias_for_first_stop_msec;
                    biased.max(0)
                })
        } else {
            stats::filtered_mean(samples, fraction).map(|mean| mean.round() as i64)
        };
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                log::error!("{key}: failed computing stop time: {e}");
                None
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use transitrun_core::model::{InMemoryTripConfigProvider, StopPath, TripConfig};

    fn t(msec: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(msec).unwrap()
    }

    fn trip_config() -> TripConfig {
        TripConfig {
            trip_id: "t1".to_string(),
            config_rev: 1,
            service_id: "wkdy".to_string(),
            route_id: "r1".to_string(),
            route_short_name: None,
            direction_id: None,
            headsign: None,
            trip_pattern_id: None,
            block_id: None,
            start_time_secs: 0,
            end_time_secs: 600,
            stop_paths: vec![
                StopPath::new("sp0", "s0", 0.0, true).unwrap(),
                StopPath::new("sp1", "s1", 100.0, false).unwrap(),
                StopPath::new("sp2", "s2", 600.0, true).unwrap(),
            ],
        }
    }

    /// departs stop 0 `late` msec after the schedule of 0, then runs the trip.
    fn trip_events(offset: i64, late: i64) -> Vec<ArrivalDeparture> {
        let dep0 = ArrivalDeparture::departure("t1", "v1", 0, t(offset + late))
            .with_stop("s0", "sp0")
            .with_scheduled_time(t(offset));
        let arr1 = ArrivalDeparture::arrival("t1", "v1", 1, t(offset + late + 60_000))
            .with_stop("s1", "sp1")
            .with_stop_path_length(100.0)
            .unwrap();
        let dep1 = ArrivalDeparture::departure("t1", "v1", 1, t(offset + late + 80_000))
            .with_stop("s1", "sp1");
        let arr2 = ArrivalDeparture::arrival("t1", "v1", 2, t(offset + late + 140_000))
            .with_stop("s2", "sp2")
            .with_stop_path_length(600.0)
            .unwrap();
        vec![dep0, arr1, dep1, arr2]
    }

    fn trip_matches(offset: i64, late: i64) -> Vec<PositionMatch> {
        vec![
            PositionMatch::new("t1", "v1", "wkdy", 2, t(offset + late + 110_000), 300.0).unwrap(),
        ]
    }

    #[test]
    fn test_first_stop_sample_late_departure() {
        let mut agg = TravelTimeAggregator::new(TravelTimesConfig::default());
        let arr0 = ArrivalDeparture::arrival("t1", "v1", 0, t(-60_000)).with_stop("s0", "sp0");
        let mut events = vec![arr0];
        events.extend(trip_events(0, 300_000));
        agg.process_trip(&events, &[]);
        let key = TripStopPathKey::new("t1", 0, "s0");
        // the arrival at the first stop contributes nothing
        assert_eq!(agg.stop_time_samples(&key), &[300_000]);
    }

    #[test]
    fn test_first_stop_sample_beyond_limit_discarded() {
        let mut agg = TravelTimeAggregator::new(TravelTimesConfig::default());
        agg.process_trip(&trip_events(0, 11 * 60 * 1000), &[]);
        let key = TripStopPathKey::new("t1", 0, "s0");
        assert!(agg.stop_time_samples(&key).is_empty());
    }

    #[test]
    fn test_first_stop_early_departure_floored() {
        let mut agg = TravelTimeAggregator::new(TravelTimesConfig::default());
        agg.process_trip(&trip_events(0, -30_000), &[]);
        let key = TripStopPathKey::new("t1", 0, "s0");
        assert_eq!(agg.stop_time_samples(&key), &[0]);

        let conf = TravelTimesConfig {
            reset_early_terminal_departures: false,
            ..Default::default()
        };
        let mut agg = TravelTimeAggregator::new(conf);
        agg.process_trip(&trip_events(0, -30_000), &[]);
        assert_eq!(agg.stop_time_samples(&key), &[-30_000]);
    }

    #[test]
    fn test_dwell_and_travel_samples() {
        let mut agg = TravelTimeAggregator::new(TravelTimesConfig::default());
        agg.process_trip(&trip_events(0, 0), &trip_matches(0, 0));
        assert_eq!(
            agg.stop_time_samples(&TripStopPathKey::new("t1", 1, "s1")),
            &[20_000]
        );
        assert_eq!(
            agg.travel_time_samples(&TripStopPathKey::new("t1", 1, "s1")),
            &[vec![60_000]]
        );
        assert_eq!(
            agg.travel_time_samples(&TripStopPathKey::new("t1", 2, "s2")),
            &[vec![20_000, 20_000, 20_000]]
        );
    }

    #[test]
    fn test_negative_dwell_discarded() {
        let mut agg = TravelTimeAggregator::new(TravelTimesConfig::default());
        let arr = ArrivalDeparture::arrival("t1", "v1", 1, t(10_000)).with_stop("s1", "sp1");
        let dep = ArrivalDeparture::departure("t1", "v1", 1, t(5_000)).with_stop("s1", "sp1");
        agg.process_trip(&[arr, dep], &[]);
        assert!(agg.is_empty());
    }

    #[test]
    fn test_schedule_adherence_gate() {
        let mut agg = TravelTimeAggregator::new(TravelTimesConfig::default());
        let arr = ArrivalDeparture::arrival("t1", "v1", 1, t(3_600_000))
            .with_stop("s1", "sp1")
            .with_scheduled_time(t(0));
        let dep = ArrivalDeparture::departure("t1", "v1", 1, t(3_620_000)).with_stop("s1", "sp1");
        agg.process_trip(&[arr, dep], &[]);
        assert!(agg.is_empty());
    }

    #[test]
    fn test_schedule_adherence_of_first_event_decides() {
        let mut agg = TravelTimeAggregator::new(TravelTimesConfig::default());
        let arr = ArrivalDeparture::arrival("t1", "v1", 1, t(3_600_000))
            .with_stop("s1", "sp1")
            .with_scheduled_time(t(3_600_000));
        let dep = ArrivalDeparture::departure("t1", "v1", 1, t(3_620_000))
            .with_stop("s1", "sp1")
            .with_scheduled_time(t(0));
        agg.process_trip(&[arr, dep], &[]);
        assert_eq!(
            agg.stop_time_samples(&TripStopPathKey::new("t1", 1, "s1")),
            &[20_000]
        );

        // unscheduled first event falls back to the second
        let mut agg = TravelTimeAggregator::new(TravelTimesConfig::default());
        let arr = ArrivalDeparture::arrival("t1", "v1", 1, t(3_600_000)).with_stop("s1", "sp1");
        let dep = ArrivalDeparture::departure("t1", "v1", 1, t(3_620_000))
            .with_stop("s1", "sp1")
            .with_scheduled_time(t(0));
        agg.process_trip(&[arr, dep], &[]);
        assert!(agg.is_empty());
    }

    #[test]
    fn test_build_map() {
        let mut agg = TravelTimeAggregator::new(TravelTimesConfig::default());
        for (day, late) in [(0, 60_000), (1, 120_000), (2, 30_000)] {
            let offset = day * 86_400_000;
            agg.process_trip(&trip_events(offset, late), &trip_matches(offset, late));
        }
        let provider = InMemoryTripConfigProvider::new(vec![trip_config()]);
        let (map, counts) = agg.build(&provider);
        assert_eq!(counts.total, 3);
        assert_eq!(counts.matched, 3);
        assert_eq!(counts.invalid, 0);

        // first stop: samples 30s, 60s, 120s. mean 70s, std dev 45.8s, biased center
        // 138.7s, window [97.1s, 198.1s] keeps 120s, less the 10s bias
        let first = map.get("t1", 0).unwrap();
        assert_eq!(first.stop_time_msec, Some(110_000));
        assert!(first.travel_times_msec.is_empty());

        let middle = map.get("t1", 1).unwrap();
        assert_eq!(middle.stop_time_msec, Some(20_000));
        assert_eq!(middle.travel_times_msec, vec![60_000]);
        assert_eq!(middle.travel_time_segment_length, 100.0);

        let last = map.get("t1", 2).unwrap();
        assert_eq!(last.stop_time_msec, None);
        assert_eq!(last.travel_times_msec, vec![20_000, 20_000, 20_000]);
        assert_eq!(last.travel_time_segment_length, 200.0);
    }

    #[test]
    fn test_build_discards_stale_keys() {
        let mut agg = TravelTimeAggregator::new(TravelTimesConfig::default());
        agg.process_trip(&trip_events(0, 0), &trip_matches(0, 0));
        // stop path 2 now has 2 segments and stop 1 was replaced
        let mut conf = trip_config();
        conf.stop_paths[2] = StopPath::new("sp2", "s2", 400.0, true).unwrap();
        conf.stop_paths[1] = StopPath::new("sp1", "s1b", 100.0, false).unwrap();
        let provider = InMemoryTripConfigProvider::new(vec![conf]);
        let (map, counts) = agg.build(&provider);
        assert_eq!(counts.total, 3);
        assert_eq!(counts.invalid, 1);
        assert_eq!(counts.unmatched, 1);
        assert_eq!(counts.matched, 1);
        assert!(map.get("t1", 1).is_none());
        assert!(!map.get("t1", 2).unwrap().is_travel_time_valid());
    }

    #[test]
    fn test_build_unknown_trip_is_invalid() {
        let mut agg = TravelTimeAggregator::new(TravelTimesConfig::default());
        agg.process_trip(&trip_events(0, 0), &[]);
        let provider = InMemoryTripConfigProvider::new(vec![]);
        let (map, counts) = agg.build(&provider);
        assert!(map.is_empty());
        assert_eq!(counts.invalid, counts.total);
    }
}
