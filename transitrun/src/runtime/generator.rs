use transitrun_core::model::{
    ArrivalDeparture, ScheduleAdherenceCalculator, ServiceTypeClassifier, TripConfigProvider,
};

use super::{RunTimeError, RunTimeProcessor};
use crate::cache::RunTimeCacheHandle;

/// what the real-time tracker knows about a vehicle when its state changes.
#[derive(Clone, Debug, PartialEq)]
pub struct VehicleState {
    pub vehicle_id: String,
    pub block_id: Option<String>,
    pub trip_index: usize,
    pub trip_id: Option<String>,
    pub at_end_of_block: bool,
    /// block, trip index and trip id of the previous state of this vehicle
    pub previous: Option<PreviousAssignment>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PreviousAssignment {
    pub block_id: Option<String>,
    pub trip_index: usize,
    pub trip_id: String,
}

impl VehicleState {
    /// the trip the vehicle has just finished, if any. a trip is finished at the end
    /// of its block, or when the vehicle moved on to another trip or block.
    pub fn completed_trip(&self) -> Option<&str> {
        if self.at_end_of_block {
            return self
                .trip_id
                .as_deref()
                .or_else(|| self.previous.as_ref().map(|p| p.trip_id.as_str()));
        }
        let previous = self.previous.as_ref()?;
        if previous.trip_index != self.trip_index || previous.block_id != self.block_id {
            Some(previous.trip_id.as_str())
        } else {
            None
        }
    }
}

/// supplies the recent arrivals and departures of a vehicle on a trip.
pub trait TripHistorySource {
    fn events_for_trip(&self, vehicle_id: &str, trip_id: &str) -> Vec<ArrivalDeparture>;
}

/// builds run times as vehicles finish trips and hands them to the shared cache.
pub struct RunTimeGenerator<A, S> {
    processor: RunTimeProcessor<A, S>,
    cache: RunTimeCacheHandle,
}

impl<A, S> RunTimeGenerator<A, S>
where
    A: ScheduleAdherenceCalculator,
    S: ServiceTypeClassifier,
{
    pub fn new(processor: RunTimeProcessor<A, S>, cache: RunTimeCacheHandle) -> Self {
        RunTimeGenerator { processor, cache }
    }

    /// true when a run time record was submitted for the trip the vehicle finished.
    pub fn handle_vehicle_state(
        &self,
        state: &VehicleState,
        history: &dyn TripHistorySource,
        provider: &dyn TripConfigProvider,
    ) -> Result<bool, RunTimeError> {
        let trip_id = match state.completed_trip() {
            Some(trip_id) => trip_id,
            None => return Ok(false),
        };
        let events = history.events_for_trip(&state.vehicle_id, trip_id);
        if events.len() < 2 {
            log::debug!(
                "only {} events for vehicle {} on trip {trip_id}, no run time",
                events.len(),
                state.vehicle_id
            );
            return Ok(false);
        }
        let result =
            self.processor
                .process_run_times_for_trip(trip_id, &state.vehicle_id, &events, provider);
        match (result.success, result.record) {
            (true, Some(record)) => {
                self.cache.submit(record)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
