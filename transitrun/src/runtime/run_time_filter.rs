//! removes anomalous run times before they are used to derive schedules.
use std::collections::HashMap;

use itertools::Itertools;
use transitrun_core::{model::RunTimesForRoutes, stats};

use crate::config::RunTimesConfig;

/// complete run time records grouped by trip id with outliers removed.
pub fn filter_run_times_for_routes(
    records: &[RunTimesForRoutes],
    config: &RunTimesConfig,
) -> HashMap<String, Vec<RunTimesForRoutes>> {
    let by_trip = records
        .iter()
        .filter(|r| r.has_complete_run_time())
        .cloned()
        .map(|r| (r.trip_id.clone(), r))
        .into_group_map();

    by_trip
        .into_iter()
        .filter_map(|(trip_id, group)| {
            let kept = if config.use_schedule_outlier_filter {
                filter_against_schedule(group, config)
            } else {
                filter_by_deviation(&trip_id, group, config.scale_of_elimination)
            };
            if kept.is_empty() {
                None
            } else {
                Some((trip_id, kept))
            }
        })
        .collect()
}

fn filter_against_schedule(
    group: Vec<RunTimesForRoutes>,
    config: &RunTimesConfig,
) -> Vec<RunTimesForRoutes> {
    group
        .into_iter()
        .filter(|r| match (r.run_time_msec(), r.scheduled_run_time_secs()) {
            (Some(actual), Some(scheduled)) => {
                let scheduled_msec = (scheduled * 1000) as f64;
                let lower = config.lower_bound_schedule_fraction * scheduled_msec;
                let upper = config.upper_bound_schedule_fraction * scheduled_msec;
                let within = lower <= actual as f64 && actual as f64 <= upper;
                if !within {
                    log::debug!(
                        "run time {actual} msec of trip {} vehicle {} outside [{lower}, {upper}]",
                        r.trip_id,
                        r.vehicle_id
                    );
                }
                within
            }
            _ => false,
        })
        .collect()
}

fn filter_by_deviation(
    trip_id: &str,
    group: Vec<RunTimesForRoutes>,
    scale: f64,
) -> Vec<RunTimesForRoutes> {
    let run_times = group.iter().filter_map(|r| r.run_time_msec()).collect_vec();
    let retained = match stats::eliminate_outliers(&run_times, scale) {
        Ok(retained) => retained,
        Err(e) => {
            log::error!("unable to filter run times of trip {trip_id}: {e}");
            return group;
        }
    };
    let mut remaining = retained.into_iter().counts();
    group
        .into_iter()
        .filter(|r| {
            let count = match r.run_time_msec() {
                Some(rt) => remaining.get_mut(&rt),
                None => None,
            };
            match count {
                Some(c) if *c > 0 => {
                    *c -= 1;
                    true
                }
                _ => false,
            }
        })
        .collect()
}
