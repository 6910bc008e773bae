use std::cell::Cell;

use transitrun_core::model::{ArrivalDeparture, PositionMatch};

use super::{EventStore, FetchError, HistoricalRecord, PageRequest, RecordKind, TimeWindow};

/// an event store backed by vectors, used by the command line app and in tests.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    arrival_departures: Vec<ArrivalDeparture>,
    matches: Vec<PositionMatch>,
    reads: Cell<usize>,
}

impl InMemoryEventStore {
    pub fn new(
        mut arrival_departures: Vec<ArrivalDeparture>,
        mut matches: Vec<PositionMatch>,
    ) -> InMemoryEventStore {
        arrival_departures.sort_by(|a, b| a.chronological_cmp(b));
        matches.sort_by_key(|m| m.time);
        InMemoryEventStore {
            arrival_departures,
            matches,
            reads: Cell::new(0),
        }
    }

    /// number of `read_range` calls served so far.
    pub fn reads(&self) -> usize {
        self.reads.get()
    }
}

fn page<T: Clone>(rows: Vec<&T>, request: PageRequest) -> Vec<T> {
    match request {
        PageRequest::Unbounded => rows.into_iter().cloned().collect(),
        PageRequest::Offset { offset, limit } => rows
            .into_iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect(),
    }
}

impl EventStore for InMemoryEventStore {
    fn count(&self, kind: RecordKind, window: &TimeWindow) -> Result<usize, FetchError> {
        let count = match kind {
            RecordKind::ArrivalDeparture => self
                .arrival_departures
                .iter()
                .filter(|ad| window.contains(&ad.time))
                .count(),
            RecordKind::PositionMatch => self
                .matches
                .iter()
                .filter(|m| window.contains(&m.time))
                .count(),
        };
        Ok(count)
    }

    fn read_range(
        &self,
        kind: RecordKind,
        window: &TimeWindow,
        request: PageRequest,
    ) -> Result<Vec<HistoricalRecord>, FetchError> {
        self.reads.set(self.reads.get() + 1);
        let result = match kind {
            RecordKind::ArrivalDeparture => {
                let rows = self
                    .arrival_departures
                    .iter()
                    .filter(|ad| window.contains(&ad.time))
                    .collect();
                page(rows, request)
                    .into_iter()
                    .map(HistoricalRecord::ArrivalDeparture)
                    .collect()
            }
            RecordKind::PositionMatch => {
                let rows = self
                    .matches
                    .iter()
                    .filter(|m| window.contains(&m.time))
                    .collect();
                page(rows, request)
                    .into_iter()
                    .map(HistoricalRecord::PositionMatch)
                    .collect()
            }
        };
        Ok(result)
    }
}
