use transitrun_core::model::{ArrivalDeparture, PositionMatch};

use super::{FetchError, PageRequest, TimeWindow};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordKind {
    ArrivalDeparture,
    PositionMatch,
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordKind::ArrivalDeparture => write!(f, "arrivals/departures"),
            RecordKind::PositionMatch => write!(f, "matches"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum HistoricalRecord {
    ArrivalDeparture(ArrivalDeparture),
    PositionMatch(PositionMatch),
}

/// read access to persisted telemetry. rows are returned ordered by time, matches
/// only include positions recorded between stops.
pub trait EventStore {
    fn count(&self, kind: RecordKind, window: &TimeWindow) -> Result<usize, FetchError>;

    fn read_range(
        &self,
        kind: RecordKind,
        window: &TimeWindow,
        page: PageRequest,
    ) -> Result<Vec<HistoricalRecord>, FetchError>;
}
