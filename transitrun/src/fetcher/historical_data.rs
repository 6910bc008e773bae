use std::collections::HashMap;

use transitrun_core::model::{ArrivalDeparture, PositionMatch, TripOccurrenceKey};

/// historical records grouped by trip occurrence, each list in chronological order.
#[derive(Clone, Debug, Default)]
pub struct HistoricalData {
    pub arrival_departures: HashMap<TripOccurrenceKey, Vec<ArrivalDeparture>>,
    pub matches: HashMap<TripOccurrenceKey, Vec<PositionMatch>>,
}

impl HistoricalData {
    pub fn empty() -> HistoricalData {
        HistoricalData::default()
    }

    pub fn is_empty(&self) -> bool {
        self.arrival_departures.is_empty() && self.matches.is_empty()
    }

    pub fn num_trip_occurrences(&self) -> usize {
        self.arrival_departures.len()
    }

    pub fn arrival_departures_for(&self, key: &TripOccurrenceKey) -> &[ArrivalDeparture] {
        self.arrival_departures
            .get(key)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn matches_for(&self, key: &TripOccurrenceKey) -> &[PositionMatch] {
        self.matches.get(key).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// restores chronological order within every group.
    pub fn sort(&mut self) {
        for events in self.arrival_departures.values_mut() {
            events.sort_by(|a, b| a.chronological_cmp(b));
        }
        for matches in self.matches.values_mut() {
            matches.sort_by_key(|m| m.time);
        }
    }
}
