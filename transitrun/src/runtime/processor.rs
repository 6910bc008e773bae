use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use transitrun_core::model::{
    validate_trip_sequence, ArrivalDeparture, CalendarServiceTypeClassifier, RunTimeRouteKey,
    RunTimesForRoutes, RunTimesForStops, ScheduleAdherenceCalculator, ScheduledTimeAdherence,
    ServiceTypeClassifier, StopPath, TripConfig, TripConfigProvider,
};

use super::{Phase, RunTimeError, RunTimeState, SpeedCalculator};
use crate::{config::RunTimesConfig, traveltimes::segment_ops};

/// how the reduction of a trip occurrence ended.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunTimeExit {
    FirstStopReached,
    /// input ran out before the departure from the first stop
    FellThrough,
}

#[derive(Clone, Debug)]
pub struct RunTimeProcessorResult {
    pub success: bool,
    pub exit: Option<RunTimeExit>,
    pub record: Option<RunTimesForRoutes>,
}

impl RunTimeProcessorResult {
    fn failure() -> Self {
        RunTimeProcessorResult {
            success: false,
            exit: None,
            record: None,
        }
    }
}

/// reduces the arrivals and departures of one trip occurrence into a run time
/// record. holds no per-trip state between calls.
pub struct RunTimeProcessor<A = ScheduledTimeAdherence, S = CalendarServiceTypeClassifier> {
    config: RunTimesConfig,
    speed_calculator: SpeedCalculator,
    timezone: Tz,
    adherence: A,
    classifier: S,
}

impl RunTimeProcessor<ScheduledTimeAdherence, CalendarServiceTypeClassifier> {
    pub fn new(config: RunTimesConfig, timezone: Tz) -> Self {
        Self::with_collaborators(
            config,
            timezone,
            ScheduledTimeAdherence,
            CalendarServiceTypeClassifier,
        )
    }
}

impl<A, S> RunTimeProcessor<A, S>
where
    A: ScheduleAdherenceCalculator,
    S: ServiceTypeClassifier,
{
    pub fn with_collaborators(config: RunTimesConfig, timezone: Tz, adherence: A, classifier: S) -> Self {
        let speed_calculator = SpeedCalculator::from(&config);
        RunTimeProcessor {
            config,
            speed_calculator,
            timezone,
            adherence,
            classifier,
        }
    }

    /// builds the run time record for one trip occurrence. failures are logged and
    /// reported with `success = false`.
    pub fn process_run_times_for_trip(
        &self,
        trip_id: &str,
        vehicle_id: &str,
        events: &[ArrivalDeparture],
        provider: &dyn TripConfigProvider,
    ) -> RunTimeProcessorResult {
        match self.reduce(trip_id, vehicle_id, events, provider) {
            Ok(result) => result,
            Err(e) => {
                log::error!("no run time for trip {trip_id} vehicle {vehicle_id}: {e}");
                RunTimeProcessorResult::failure()
            }
        }
    }

    fn reduce(
        &self,
        trip_id: &str,
        vehicle_id: &str,
        events: &[ArrivalDeparture],
        provider: &dyn TripConfigProvider,
    ) -> Result<RunTimeProcessorResult, RunTimeError> {
        let trip = provider
            .get_trip(trip_id)
            .ok_or_else(|| RunTimeError::UnknownTrip(trip_id.to_string()))?;
        let expected_last = trip
            .last_stop_path_index()
            .ok_or_else(|| RunTimeError::EmptyTrip {
                trip_id: trip_id.to_string(),
            })?;
        if let Some(e) = events.iter().find(|e| !e.matches_trip(trip_id, vehicle_id)) {
            return Err(RunTimeError::MismatchedEvent {
                trip_id: trip_id.to_string(),
                vehicle_id: vehicle_id.to_string(),
                event: e.to_string(),
            });
        }
        validate_trip_sequence(events)?;

        let mut newest_first: Vec<&ArrivalDeparture> = events.iter().collect();
        newest_first.sort_by(|a, b| b.chronological_cmp(a));

        let mut state = RunTimeState::new();
        for (i, event) in newest_first.iter().enumerate() {
            match state.phase {
                Phase::AwaitingFinalArrival => {
                    if event.is_arrival() && event.stop_path_index == expected_last {
                        let record = self.stop_record(event, &newest_first[i + 1..], trip, None, true);
                        state.on_final_arrival(event.time, event.stop_path_index, expected_last, record);
                    }
                }
                Phase::AccumulatingMiddleStops => {
                    if event.is_departure() {
                        let dwell = dwell_time(event, &newest_first);
                        let record =
                            self.stop_record(event, &newest_first[i + 1..], trip, dwell, false);
                        if state.on_departure(event.time, record) {
                            break;
                        }
                    }
                }
                Phase::Finalized => break,
            }
        }

        if state.phase == Phase::AwaitingFinalArrival {
            return Err(RunTimeError::NoFinalArrival {
                trip_id: trip_id.to_string(),
                expected_last,
            });
        }
        let exit = if state.phase == Phase::Finalized {
            RunTimeExit::FirstStopReached
        } else {
            log::error!(
                "trip {trip_id} vehicle {vehicle_id} ended at stop path index {:?} without reaching the first stop, keeping partial run time",
                state.first_stop_path_index
            );
            state.on_exhausted();
            RunTimeExit::FellThrough
        };

        let record = match self.finalize(trip, vehicle_id, state, exit, expected_last, provider) {
            Some(r) => r,
            None => return Ok(RunTimeProcessorResult::failure()),
        };
        Ok(RunTimeProcessorResult {
            success: true,
            exit: Some(exit),
            record: Some(record),
        })
    }

    /// builds the per-stop record for an event. `older` holds the events preceding
    /// it in time, newest first.
    fn stop_record(
        &self,
        event: &ArrivalDeparture,
        older: &[&ArrivalDeparture],
        trip: &TripConfig,
        dwell_msec: Option<i64>,
        last_stop: bool,
    ) -> RunTimesForStops {
        let index = event.stop_path_index;
        let stop_path: Option<&StopPath> = trip.stop_path(index);
        let previous = match index {
            0 => None,
            k => older
                .iter()
                .find(|e| e.is_departure() && e.stop_path_index == k - 1)
                .copied(),
        };
        let length = event
            .stop_path_length
            .or_else(|| stop_path.map(|sp| sp.length));
        // the last stop never dwells, speed is measured up to its arrival
        let speed_dwell = if last_stop { Some(0) } else { dwell_msec };
        let speed = self.speed_calculator.calculate(
            &self.adherence,
            previous,
            event,
            speed_dwell,
            length,
        );
        // without a dwell the departure time would fold unmeasured dwell into the run time
        let run_time_msec = match (index, previous, speed_dwell) {
            (0, _, _) | (_, None, _) | (_, _, None) => None,
            (_, Some(prev), Some(dwell)) => {
                let departure = segment_ops::effective_departure_time(
                    prev,
                    self.config.reset_early_terminal_departures,
                );
                Some(event.time_msec() - dwell - departure)
            }
        };
        let stop_path_id = match stop_path {
            Some(sp) if event.stop_path_id.is_empty() => sp.id.clone(),
            _ => event.stop_path_id.clone(),
        };
        RunTimesForStops {
            stop_path_id,
            stop_path_index: index,
            config_rev: trip.config_rev,
            time: event.time,
            prev_stop_departure_time: previous.map(|p| p.time),
            scheduled_time: event.scheduled_time,
            scheduled_prev_stop_departure_time: previous.and_then(|p| p.scheduled_time),
            run_time_msec,
            dwell_time_msec: if last_stop { None } else { dwell_msec },
            speed,
            last_stop,
            time_point: stop_path
                .map(|sp| sp.is_schedule_adherence_stop)
                .unwrap_or(false),
        }
    }

    /// replaces non-finite speeds with the clamping speed, or drops the stop when
    /// none is configured. None when no stops remain.
    fn validate_speeds(&self, stops: Vec<RunTimesForStops>) -> Option<Vec<RunTimesForStops>> {
        let had_stops = !stops.is_empty();
        let validated: Vec<RunTimesForStops> = stops
            .into_iter()
            .filter_map(|mut stop| match stop.speed {
                Some(speed) if !speed.is_finite() => match self.config.clamping_speed {
                    Some(clamping) => {
                        stop.speed = Some(clamping);
                        Some(stop)
                    }
                    None => {
                        log::error!(
                            "dropping stop path index {} at {}: speed is not a number",
                            stop.stop_path_index,
                            stop.time
                        );
                        None
                    }
                },
                _ => Some(stop),
            })
            .collect();
        if had_stops && validated.is_empty() {
            None
        } else {
            Some(validated)
        }
    }

    fn finalize(
        &self,
        trip: &TripConfig,
        vehicle_id: &str,
        state: RunTimeState,
        exit: RunTimeExit,
        expected_last: usize,
        provider: &dyn TripConfigProvider,
    ) -> Option<RunTimesForRoutes> {
        let total_dwell_msec = state.total_dwell_msec();
        let mut stops = self.validate_speeds(state.stops)?;
        stops.sort_by_key(|s| s.stop_path_index);

        let key = RunTimeRouteKey::new(
            trip.config_rev,
            &trip.trip_id,
            state.first_stop_departure_time,
            vehicle_id,
        );
        let mut record = RunTimesForRoutes::new(&key);
        record.service_id = trip.service_id.clone();
        record.route_short_name = trip.route_short_name.clone();
        record.direction_id = trip.direction_id.clone();
        record.headsign = trip.headsign.clone();
        record.trip_pattern_id = trip.trip_pattern_id.clone();
        record.end_time = state.final_arrival_time;
        record.scheduled_start_time_secs = Some(trip.start_time_secs);
        record.scheduled_end_time_secs = Some(trip.end_time_secs);
        record.next_trip_start = Some(provider.next_trip_start(trip));
        record.service_type = state.first_stop_departure_time.map(|start| {
            self.classifier
                .service_type(&start.with_timezone(&self.timezone), trip.start_time_secs)
        });
        record.dwell_time_msec = total_dwell_msec;
        record.start_stop_path_index = state.first_stop_path_index;
        record.actual_last_stop_path_index = state.final_stop_path_index;
        record.expected_last_stop_path_index = Some(expected_last);
        record.partial = exit == RunTimeExit::FellThrough;
        record.run_times_for_stops = stops;
        Some(record)
    }
}

/// dwell at the stop of a departure: reported by the event, or measured from the
/// arrival at the same stop. negative values are discarded.
fn dwell_time(departure: &ArrivalDeparture, events: &[&ArrivalDeparture]) -> Option<i64> {
    let dwell = departure.dwell_time_msec.or_else(|| {
        events
            .iter()
            .find(|e| e.is_arrival() && e.stop_path_index == departure.stop_path_index)
            .map(|arrival| departure.time_msec() - arrival.time_msec())
    })?;
    if dwell < 0 {
        log::error!("negative dwell time {dwell} msec for {departure}");
        return None;
    }
    Some(dwell)
}
