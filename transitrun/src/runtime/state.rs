use chrono::{DateTime, Utc};
use transitrun_core::model::RunTimesForStops;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// walking back from the end of the trip until the arrival at its last stop
    AwaitingFinalArrival,
    /// collecting departures from the last stop back toward the first
    AccumulatingMiddleStops,
    /// the departure from the first stop was processed
    Finalized,
}

/// per trip occurrence state while reducing its events, newest first.
#[derive(Clone, Debug)]
pub struct RunTimeState {
    pub phase: Phase,
    pub final_arrival_time: Option<DateTime<Utc>>,
    pub final_stop_path_index: Option<usize>,
    /// stop path index whose dwell time is expected next for the total to stay whole
    dwell_countdown: i64,
    /// None once any stop in the chain is missing its dwell time
    total_dwell_msec: Option<i64>,
    pub first_stop_departure_time: Option<DateTime<Utc>>,
    pub first_stop_path_index: Option<usize>,
    pub stops: Vec<RunTimesForStops>,
}

impl RunTimeState {
    pub fn new() -> RunTimeState {
        RunTimeState {
            phase: Phase::AwaitingFinalArrival,
            final_arrival_time: None,
            final_stop_path_index: None,
            dwell_countdown: -1,
            total_dwell_msec: None,
            first_stop_departure_time: None,
            first_stop_path_index: None,
            stops: vec![],
        }
    }

    pub fn total_dwell_msec(&self) -> Option<i64> {
        self.total_dwell_msec
    }

    pub fn on_final_arrival(
        &mut self,
        time: DateTime<Utc>,
        stop_path_index: usize,
        expected_last_index: usize,
        record: RunTimesForStops,
    ) {
        self.final_arrival_time = Some(time);
        self.final_stop_path_index = Some(stop_path_index);
        self.dwell_countdown = expected_last_index as i64 - 1;
        self.total_dwell_msec = Some(0);
        self.stops.push(record);
        self.phase = Phase::AccumulatingMiddleStops;
    }

    /// records a departure walking backward through the trip. returns true once the
    /// first stop has been reached.
    pub fn on_departure(&mut self, time: DateTime<Utc>, record: RunTimesForStops) -> bool {
        let index = record.stop_path_index;
        self.first_stop_departure_time = Some(time);
        self.first_stop_path_index = Some(index);
        self.accumulate_dwell(index, record.dwell_time_msec);
        self.stops.push(record);
        if index == 0 {
            self.phase = Phase::Finalized;
        }
        self.phase == Phase::Finalized
    }

    fn accumulate_dwell(&mut self, index: usize, dwell_msec: Option<i64>) {
        match (self.total_dwell_msec, dwell_msec) {
            (Some(total), Some(dwell)) if index as i64 == self.dwell_countdown => {
                self.total_dwell_msec = Some(total + dwell);
                self.dwell_countdown -= 1;
            }
            _ => {
                if self.total_dwell_msec.is_some() {
                    log::debug!(
                        "dwell chain broken at stop path index {index}, expected {}",
                        self.dwell_countdown
                    );
                }
                self.total_dwell_msec = None;
            }
        }
    }

    /// the input ran out before the first stop. a partial dwell total is not kept.
    pub fn on_exhausted(&mut self) {
        if self.dwell_countdown >= 0 {
            self.total_dwell_msec = None;
        }
    }
}

impl Default for RunTimeState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::TimeZone;

    fn stop(index: usize, dwell: Option<i64>) -> RunTimesForStops {
        RunTimesForStops {
            stop_path_id: format!("sp{index}"),
            stop_path_index: index,
            config_rev: 0,
            time: Utc.timestamp_millis_opt(index as i64 * 1000).unwrap(),
            prev_stop_departure_time: None,
            scheduled_time: None,
            scheduled_prev_stop_departure_time: None,
            run_time_msec: None,
            dwell_time_msec: dwell,
            speed: None,
            last_stop: false,
            time_point: false,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.timestamp_millis_opt(0).unwrap()
    }

    #[test]
    fn test_dwell_chain_complete() {
        let mut state = RunTimeState::new();
        state.on_final_arrival(now(), 3, 3, stop(3, None));
        assert_eq!(state.phase, Phase::AccumulatingMiddleStops);
        assert!(!state.on_departure(now(), stop(2, Some(10))));
        assert!(!state.on_departure(now(), stop(1, Some(20))));
        assert!(state.on_departure(now(), stop(0, Some(5))));
        assert_eq!(state.total_dwell_msec(), Some(35));
        assert_eq!(state.phase, Phase::Finalized);
    }

    #[test]
    fn test_dwell_chain_broken_by_missing_stop() {
        let mut state = RunTimeState::new();
        state.on_final_arrival(now(), 3, 3, stop(3, None));
        state.on_departure(now(), stop(2, Some(10)));
        // stop 1 was never observed
        state.on_departure(now(), stop(0, Some(5)));
        assert_eq!(state.total_dwell_msec(), None);
    }

    #[test]
    fn test_dwell_chain_broken_by_missing_dwell() {
        let mut state = RunTimeState::new();
        state.on_final_arrival(now(), 2, 2, stop(2, None));
        state.on_departure(now(), stop(1, None));
        state.on_departure(now(), stop(0, Some(5)));
        assert_eq!(state.total_dwell_msec(), None);
    }

    #[test]
    fn test_exhausted_discards_partial_dwell() {
        let mut state = RunTimeState::new();
        state.on_final_arrival(now(), 3, 3, stop(3, None));
        state.on_departure(now(), stop(2, Some(10)));
        state.on_exhausted();
        assert_eq!(state.total_dwell_msec(), None);
        assert_eq!(state.first_stop_path_index, Some(2));
    }
}
