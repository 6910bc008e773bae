//! decomposition of a stop path traversal into fixed-length travel time segments.
//!
//! a departure from the previous stop and the arrival at the end of the stop path
//! bound the traversal. paths shorter than the maximum segment length are a single
//! segment. longer paths are split into `floor(length / max) + 1` equal segments and
//! the time each segment boundary is crossed is interpolated from the matches
//! recorded along the path.

use transitrun_core::model::{number_of_segments, ArrivalDeparture, PositionMatch};

use super::TravelTimeError;
use crate::config::TravelTimesConfig;

/// distances this close below a segment boundary are treated as inside the lower
/// segment, so an arrival at the end of the path stays in the final segment.
const BOUNDARY_EPSILON: f64 = 1e-7;

/// a known (distance, time) point along a stop path.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Vertex {
    pub distance: f64,
    pub time_msec: i64,
}

/// departure time used for travel times. early departures from the first stop of
/// a trip are moved to the scheduled departure when `reset_early` is set.
pub fn effective_departure_time(departure: &ArrivalDeparture, reset_early: bool) -> i64 {
    let time = departure.time_msec();
    match departure.scheduled_time_msec() {
        Some(scheduled) if reset_early && departure.stop_path_index == 0 && time < scheduled => {
            scheduled
        }
        _ => time,
    }
}

fn segment_index(distance: f64, segment_length: f64) -> usize {
    ((distance - BOUNDARY_EPSILON).max(0.0) / segment_length) as usize
}

/// per-segment travel times for the traversal from `departure` to `arrival`.
/// `matches` may include matches for other stop paths, only those on the arrival's
/// stop path are used. the result has one entry per segment and is clamped to the
/// configured speed range.
pub fn determine_travel_times(
    departure: &ArrivalDeparture,
    arrival: &ArrivalDeparture,
    matches: &[PositionMatch],
    config: &TravelTimesConfig,
) -> Result<Vec<i64>, TravelTimeError> {
    let trip_id = &arrival.trip_id;
    let stop_path_index = arrival.stop_path_index;
    let length = arrival
        .stop_path_length
        .ok_or_else(|| TravelTimeError::MissingStopPathLength {
            trip_id: trip_id.clone(),
            stop_path_index,
        })?;
    let departure_time = effective_departure_time(departure, config.reset_early_terminal_departures);
    let arrival_time = arrival.time_msec();

    if length < config.max_travel_time_segment_length {
        let travel_time = arrival_time - departure_time;
        if travel_time < 0 {
            return Err(TravelTimeError::NegativeTravelTime {
                trip_id: trip_id.clone(),
                stop_path_index,
                time: travel_time,
            });
        }
        return Ok(vec![travel_time]);
    }

    let n_segments = number_of_segments(length, config.max_travel_time_segment_length);
    let segment_length = length / n_segments as f64;

    let mut vertices = vec![Vertex {
        distance: 0.0,
        time_msec: departure_time,
    }];
    for m in matches
        .iter()
        .filter(|m| m.stop_path_index == stop_path_index)
    {
        if let Err(e) = m.validate(Some(length)) {
            log::warn!("ignoring match while computing travel times: {e}");
            continue;
        }
        vertices.push(Vertex {
            distance: m.distance_along_stop_path,
            time_msec: m.time_msec(),
        });
    }
    vertices.push(Vertex {
        distance: length,
        time_msec: arrival_time,
    });

    let crossings = crossing_times(&vertices, segment_length, trip_id, stop_path_index)?;
    let travel_times = crossings
        .windows(2)
        .map(|w| w[1] - w[0])
        .map(|t| {
            clamp_segment_time(
                t,
                segment_length,
                config.min_segment_speed_mps,
                config.max_segment_speed_mps,
                trip_id,
                stop_path_index,
            )
        })
        .collect();
    Ok(travel_times)
}

/// times at which the vehicle was at the start of the path, at each interior segment
/// boundary, and at the end of the path. fails if the vertices go back in time or
/// fall back into an earlier segment.
pub fn crossing_times(
    vertices: &[Vertex],
    segment_length: f64,
    trip_id: &str,
    stop_path_index: usize,
) -> Result<Vec<i64>, TravelTimeError> {
    let (first, last) = match (vertices.first(), vertices.last()) {
        (Some(f), Some(l)) if vertices.len() >= 2 => (f, l),
        _ => {
            return Err(TravelTimeError::Internal(format!(
                "trip {trip_id} stop path {stop_path_index}: at least two vertices required"
            )))
        }
    };

    let mut result = vec![first.time_msec];
    for pair in vertices.windows(2) {
        let (v1, v2) = (pair[0], pair[1]);
        if v2.time_msec < v1.time_msec {
            return Err(TravelTimeError::NonMonotonicTime {
                trip_id: trip_id.to_string(),
                stop_path_index,
                distance: v2.distance,
                time: v2.time_msec,
                previous_time: v1.time_msec,
            });
        }
        let seg1 = segment_index(v1.distance, segment_length);
        let seg2 = segment_index(v2.distance, segment_length);
        if seg2 < seg1 {
            return Err(TravelTimeError::DistanceRegression {
                trip_id: trip_id.to_string(),
                stop_path_index,
                from_segment: seg1,
                to_segment: seg2,
            });
        }
        if seg1 == seg2 {
            continue;
        }
        let distance = v2.distance - v1.distance;
        let elapsed = (v2.time_msec - v1.time_msec) as f64;
        for boundary in (seg1 + 1)..=seg2 {
            let to_boundary = boundary as f64 * segment_length - v1.distance;
            let crossing = v1.time_msec + (to_boundary * elapsed / distance) as i64;
            result.push(crossing);
        }
    }
    result.push(last.time_msec);
    Ok(result)
}

/// limits a segment time to the range implied by the speed bounds. negative times
/// are data errors and become zero.
pub fn clamp_segment_time(
    time_msec: i64,
    segment_length: f64,
    min_speed_mps: f64,
    max_speed_mps: f64,
    trip_id: &str,
    stop_path_index: usize,
) -> i64 {
    if time_msec < 0 {
        log::error!(
            "trip {trip_id} stop path {stop_path_index}: segment time {time_msec} msec is negative, using 0"
        );
        return 0;
    }
    let speed_mps = if time_msec == 0 {
        f64::INFINITY
    } else {
        segment_length * 1000.0 / time_msec as f64
    };
    if speed_mps < min_speed_mps {
        let clamped = (segment_length * 1000.0 / min_speed_mps).round() as i64;
        log::warn!(
            "trip {trip_id} stop path {stop_path_index}: speed {speed_mps:.2} m/s below minimum {min_speed_mps}, segment time {time_msec} -> {clamped} msec"
        );
        clamped
    } else if speed_mps > max_speed_mps {
        let clamped = (segment_length * 1000.0 / max_speed_mps).round() as i64;
        log::warn!(
            "trip {trip_id} stop path {stop_path_index}: speed {speed_mps:.2} m/s above maximum {max_speed_mps}, segment time {time_msec} -> {clamped} msec"
        );
        clamped
    } else {
        time_msec
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn t(msec: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(msec).unwrap()
    }

    fn pair(length: f64, dep: i64, arr: i64) -> (ArrivalDeparture, ArrivalDeparture) {
        let departure = ArrivalDeparture::departure("t1", "v1", 1, t(dep));
        let arrival = ArrivalDeparture::arrival("t1", "v1", 2, t(arr))
            .with_stop_path_length(length)
            .unwrap();
        (departure, arrival)
    }

    fn unclamped() -> TravelTimesConfig {
        TravelTimesConfig {
            max_segment_speed_mps: f64::INFINITY,
            ..Default::default()
        }
    }

    #[test]
    fn test_single_segment() {
        let (d, a) = pair(100.0, 0, 60_000);
        let times = determine_travel_times(&d, &a, &[], &TravelTimesConfig::default()).unwrap();
        assert_eq!(times, vec![60_000]);
    }

    #[test]
    fn test_single_segment_early_terminal_departure() {
        let departure = ArrivalDeparture::departure("t1", "v1", 0, t(0))
            .with_scheduled_time(t(20_000));
        let arrival = ArrivalDeparture::arrival("t1", "v1", 1, t(60_000))
            .with_stop_path_length(100.0)
            .unwrap();
        let conf = TravelTimesConfig::default();
        let times = determine_travel_times(&departure, &arrival, &[], &conf).unwrap();
        assert_eq!(times, vec![40_000]);

        let no_reset = TravelTimesConfig {
            reset_early_terminal_departures: false,
            ..Default::default()
        };
        let times = determine_travel_times(&departure, &arrival, &[], &no_reset).unwrap();
        assert_eq!(times, vec![60_000]);
    }

    #[test]
    fn test_three_segments_with_one_match() {
        let (d, a) = pair(600.0, 0, 60_000);
        let m = PositionMatch::new("t1", "v1", "s", 2, t(30_000), 300.0).unwrap();
        let times =
            determine_travel_times(&d, &a, &[m], &TravelTimesConfig::default()).unwrap();
        // crossings at 200 and 400 land at 20s and 40s
        assert_eq!(times, vec![20_000, 20_000, 20_000]);
        assert_eq!(times.iter().sum::<i64>(), 60_000);
    }

    #[test]
    fn test_segment_sum_identity_with_uneven_matches() {
        let (d, a) = pair(1000.0, 5_000, 187_000);
        let matches = vec![
            PositionMatch::new("t1", "v1", "s", 2, t(40_000), 130.0).unwrap(),
            PositionMatch::new("t1", "v1", "s", 2, t(41_000), 130.0).unwrap(),
            PositionMatch::new("t1", "v1", "s", 2, t(101_000), 577.0).unwrap(),
            // a match on a different stop path is ignored
            PositionMatch::new("t1", "v1", "s", 3, t(50_000), 10.0).unwrap(),
        ];
        let times = determine_travel_times(&d, &a, &matches, &unclamped()).unwrap();
        // 1000 / 250 + 1 = 5 segments of 200
        assert_eq!(times.len(), 5);
        assert_eq!(times.iter().sum::<i64>(), 182_000);
        assert!(times.iter().all(|t| *t >= 0));
    }

    #[test]
    fn test_match_on_boundary_keeps_segment_count() {
        let (d, a) = pair(600.0, 0, 60_000);
        let m = PositionMatch::new("t1", "v1", "s", 2, t(25_000), 200.0).unwrap();
        let times = determine_travel_times(&d, &a, &[m], &unclamped()).unwrap();
        assert_eq!(times.len(), 3);
        assert_eq!(times[0], 25_000);
        assert_eq!(times.iter().sum::<i64>(), 60_000);
    }

    #[test]
    fn test_non_monotonic_time_fails() {
        let (d, a) = pair(600.0, 10_000, 60_000);
        // matched before the departure, as after a restart with an off-schedule match
        let m = PositionMatch::new("t1", "v1", "s", 2, t(5_000), 300.0).unwrap();
        let result = determine_travel_times(&d, &a, &[m], &TravelTimesConfig::default());
        assert!(matches!(
            result,
            Err(TravelTimeError::NonMonotonicTime { .. })
        ));
    }

    #[test]
    fn test_distance_regression_fails() {
        let (d, a) = pair(600.0, 0, 60_000);
        let matches = vec![
            PositionMatch::new("t1", "v1", "s", 2, t(20_000), 450.0).unwrap(),
            PositionMatch::new("t1", "v1", "s", 2, t(30_000), 100.0).unwrap(),
        ];
        let result = determine_travel_times(&d, &a, &matches, &TravelTimesConfig::default());
        assert!(matches!(
            result,
            Err(TravelTimeError::DistanceRegression { .. })
        ));
    }

    #[test]
    fn test_missing_length_fails() {
        let d = ArrivalDeparture::departure("t1", "v1", 1, t(0));
        let a = ArrivalDeparture::arrival("t1", "v1", 2, t(10));
        let result = determine_travel_times(&d, &a, &[], &TravelTimesConfig::default());
        assert!(matches!(
            result,
            Err(TravelTimeError::MissingStopPathLength { .. })
        ));
    }

    #[test]
    fn test_clamping_bounds_each_segment() {
        // 200m segments: max 27 m/s -> at least 7407 msec, min 2 m/s -> at most 100000 msec
        assert_eq!(clamp_segment_time(1_000, 200.0, 2.0, 27.0, "t", 1), 7_407);
        assert_eq!(clamp_segment_time(0, 200.0, 2.0, 27.0, "t", 1), 7_407);
        assert_eq!(clamp_segment_time(500_000, 200.0, 2.0, 27.0, "t", 1), 100_000);
        assert_eq!(clamp_segment_time(20_000, 200.0, 2.0, 27.0, "t", 1), 20_000);
        assert_eq!(clamp_segment_time(-5, 200.0, 2.0, 27.0, "t", 1), 0);
    }

    #[test]
    fn test_clamped_decomposition_respects_speed_range() {
        let (d, a) = pair(600.0, 0, 60_000);
        // vehicle covers the first 400m in 2 seconds, way over 27 m/s
        let m = PositionMatch::new("t1", "v1", "s", 2, t(2_000), 400.0).unwrap();
        let conf = TravelTimesConfig::default();
        let times = determine_travel_times(&d, &a, &[m], &conf).unwrap();
        let min_time = (200.0 * 1000.0 / conf.max_segment_speed_mps).round() as i64;
        assert_eq!(times.len(), 3);
        assert!(times.iter().all(|t| *t >= min_time));
    }
}
