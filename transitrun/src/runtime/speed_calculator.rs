use transitrun_core::{
    model::{ArrivalDeparture, ScheduleAdherenceCalculator},
    util::speed_ops::{self, SpeedUnit},
};

use crate::{config::RunTimesConfig, traveltimes::segment_ops};

/// speed over a stop path from the departure at the previous stop to the arrival
/// at the current one.
#[derive(Clone, Debug)]
pub struct SpeedCalculator {
    pub min_speed_mps: f64,
    pub max_speed_mps: f64,
    pub unit: SpeedUnit,
    pub max_schedule_adherence_msec: i64,
    pub reset_early_terminal_departures: bool,
}

impl From<&RunTimesConfig> for SpeedCalculator {
    fn from(value: &RunTimesConfig) -> Self {
        SpeedCalculator {
            min_speed_mps: value.min_stop_path_speed_mps,
            max_speed_mps: value.max_stop_path_speed_mps,
            unit: value.speed_unit,
            max_schedule_adherence_msec: value.max_schedule_adherence_secs * 1000,
            reset_early_terminal_departures: value.reset_early_terminal_departures,
        }
    }
}

impl SpeedCalculator {
    fn is_valid_pair(
        &self,
        adherence: &dyn ScheduleAdherenceCalculator,
        previous: &ArrivalDeparture,
        current: &ArrivalDeparture,
        dwell_msec: Option<i64>,
        length: Option<f64>,
    ) -> bool {
        let within_schedule = |e: &ArrivalDeparture| {
            adherence
                .schedule_adherence(e)
                .map(|adh| {
                    adh.is_within_bounds(
                        self.max_schedule_adherence_msec,
                        self.max_schedule_adherence_msec,
                    )
                })
                .unwrap_or(true)
        };
        within_schedule(previous)
            && within_schedule(current)
            && previous.stop_path_index != current.stop_path_index
            && previous.is_departure()
            && current.stop_path_index == previous.stop_path_index + 1
            && dwell_msec.is_some()
            && length.map(|l| l.is_finite()).unwrap_or(false)
    }

    /// speed in the configured unit. zero at the first stop or without a previous
    /// departure, None when the pair cannot be measured, NaN when the elapsed time is
    /// not positive.
    pub fn calculate(
        &self,
        adherence: &dyn ScheduleAdherenceCalculator,
        previous: Option<&ArrivalDeparture>,
        current: &ArrivalDeparture,
        dwell_msec: Option<i64>,
        length: Option<f64>,
    ) -> Option<f64> {
        let previous = match previous {
            Some(p) if current.stop_path_index > 0 => p,
            _ => return Some(0.0),
        };
        if !self.is_valid_pair(adherence, previous, current, dwell_msec, length) {
            return None;
        }
        let length = length?;
        let departure =
            segment_ops::effective_departure_time(previous, self.reset_early_terminal_departures);
        let travel_msec = current.time_msec() - dwell_msec.unwrap_or(0) - departure;
        if travel_msec <= 0 {
            log::error!(
                "non-positive travel time {travel_msec} msec between {previous} and {current}"
            );
            return Some(f64::NAN);
        }
        let mps = speed_ops::meters_per_second(length, travel_msec)?;
        let clamped = if mps > self.max_speed_mps {
            log::warn!(
                "speed {mps:.2} m/s above maximum {} for {current}",
                self.max_speed_mps
            );
            self.max_speed_mps
        } else if mps < self.min_speed_mps {
            log::warn!(
                "speed {mps:.2} m/s below minimum {} for {current}",
                self.min_speed_mps
            );
            self.min_speed_mps
        } else {
            mps
        };
        Some(self.unit.convert_meters_per_second(clamped))
    }
}
