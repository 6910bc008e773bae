use std::time::Instant;

use chrono_tz::Tz;
use transitrun_core::model::TripOccurrenceKey;

use super::{
    EventStore, FetchError, HistoricalData, HistoricalRecord, PageRequest, PagingStrategy,
    RecordKind, TimeWindow,
};
use crate::config::FetcherConfig;

/// reads arrivals/departures and matches for a time window and groups them by trip
/// occurrence. performs no writes.
#[derive(Clone, Debug)]
pub struct DataFetcher {
    pub timezone: Tz,
    pub day_boundary_offset_hours: i64,
    pub paging: PagingStrategy,
}

impl From<&FetcherConfig> for DataFetcher {
    fn from(value: &FetcherConfig) -> Self {
        DataFetcher {
            timezone: value.timezone,
            day_boundary_offset_hours: value.day_boundary_offset_hours,
            paging: PagingStrategy::from(value),
        }
    }
}

impl DataFetcher {
    pub fn new(timezone: Tz, day_boundary_offset_hours: i64, paging: PagingStrategy) -> Self {
        DataFetcher {
            timezone,
            day_boundary_offset_hours,
            paging,
        }
    }

    /// reads all historical data in the window. matches are read first; when the
    /// window contains none, arrivals/departures are not read and the result is
    /// empty. callers check [`HistoricalData::is_empty`].
    pub fn read_data(
        &self,
        store: &dyn EventStore,
        window: &TimeWindow,
    ) -> Result<HistoricalData, FetchError> {
        let mut data = HistoricalData::empty();
        self.read_kind(store, window, RecordKind::PositionMatch, &mut data)?;
        if data.matches.is_empty() {
            log::warn!("no matches found in {window}, skipping arrivals/departures");
            return Ok(data);
        }
        self.read_kind(store, window, RecordKind::ArrivalDeparture, &mut data)?;
        data.sort();
        Ok(data)
    }

    /// reads only arrivals and departures, for consumers that need no matches.
    pub fn read_arrival_departures(
        &self,
        store: &dyn EventStore,
        window: &TimeWindow,
    ) -> Result<HistoricalData, FetchError> {
        let mut data = HistoricalData::empty();
        self.read_kind(store, window, RecordKind::ArrivalDeparture, &mut data)?;
        data.sort();
        Ok(data)
    }

    fn read_kind(
        &self,
        store: &dyn EventStore,
        window: &TimeWindow,
        kind: RecordKind,
        data: &mut HistoricalData,
    ) -> Result<(), FetchError> {
        let timer = Instant::now();
        let total = store.count(kind, window)?;
        log::info!("reading {total} {kind} for {window} using {:?}", self.paging);
        let mut read = 0;
        match self.paging {
            PagingStrategy::Offset { page_size } => loop {
                let request = PageRequest::Offset {
                    offset: read,
                    limit: page_size,
                };
                let batch = store.read_range(kind, window, request)?;
                let batch_size = batch.len();
                read += batch_size;
                self.add_records(batch, data);
                log_progress(kind, read, total);
                if batch_size == 0 || batch_size < page_size {
                    break;
                }
            },
            PagingStrategy::DayByDay => {
                for day in window.days() {
                    let batch = store.read_range(kind, &day, PageRequest::Unbounded)?;
                    read += batch.len();
                    self.add_records(batch, data);
                    log_progress(kind, read, total);
                }
            }
        }
        log::info!(
            "read {read} {kind} in {} msec",
            timer.elapsed().as_millis()
        );
        Ok(())
    }

    fn add_records(&self, records: Vec<HistoricalRecord>, data: &mut HistoricalData) {
        for record in records {
            match record {
                HistoricalRecord::ArrivalDeparture(event) => {
                    if let Err(e) = event.validate() {
                        log::error!("ignoring invalid event {event}: {e}");
                        continue;
                    }
                    let key = TripOccurrenceKey::for_event(
                        &event,
                        &self.timezone,
                        self.day_boundary_offset_hours,
                    );
                    data.arrival_departures.entry(key).or_default().push(event);
                }
                HistoricalRecord::PositionMatch(m) => {
                    if let Err(e) = m.validate(None) {
                        log::error!("ignoring invalid match for trip {}: {e}", m.trip_id);
                        continue;
                    }
                    let key = TripOccurrenceKey::for_match(
                        &m,
                        &self.timezone,
                        self.day_boundary_offset_hours,
                    );
                    data.matches.entry(key).or_default().push(m);
                }
            }
        }
    }
}

fn log_progress(kind: RecordKind, read: usize, total: usize) {
    let percent = if total == 0 {
        100.0
    } else {
        read as f64 * 100.0 / total as f64
    };
    log::info!("read {read} of {total} {kind} ({percent:.1}%)");
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::fetcher::InMemoryEventStore;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use transitrun_core::model::{ArrivalDeparture, PositionMatch};

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn store(days: i64) -> InMemoryEventStore {
        let mut events = vec![];
        let mut matches = vec![];
        for day in 0..days {
            let t0 = base() + Duration::days(day);
            for trip in ["t1", "t2"] {
                events.push(
                    ArrivalDeparture::departure(trip, "v1", 0, t0).with_service_id("wkdy"),
                );
                events.push(
                    ArrivalDeparture::arrival(trip, "v1", 1, t0 + Duration::seconds(90))
                        .with_service_id("wkdy"),
                );
                matches.push(
                    PositionMatch::new(trip, "v1", "wkdy", 1, t0 + Duration::seconds(45), 10.0)
                        .unwrap(),
                );
            }
        }
        InMemoryEventStore::new(events, matches)
    }

    #[test]
    fn test_zero_page_size_terminates() {
        let store = store(1);
        let window = TimeWindow::new(base(), base() + Duration::days(1)).unwrap();
        let fetcher = DataFetcher::new(chrono_tz::UTC, 3, PagingStrategy::Offset { page_size: 0 });
        let data = fetcher.read_arrival_departures(&store, &window).unwrap();
        assert!(data.is_empty());
        assert_eq!(store.reads(), 1);
    }

    #[test]
    fn test_offset_paging_groups_by_occurrence() {
        let store = store(3);
        let window = TimeWindow::new(base(), base() + Duration::days(3)).unwrap();
        let fetcher = DataFetcher::new(chrono_tz::UTC, 3, PagingStrategy::Offset { page_size: 4 });
        let data = fetcher.read_data(&store, &window).unwrap();
        // 2 trips x 3 days
        assert_eq!(data.num_trip_occurrences(), 6);
        assert_eq!(data.matches.len(), 6);
        for events in data.arrival_departures.values() {
            assert_eq!(events.len(), 2);
            assert!(events[0].is_departure());
        }
        // matches: 6 rows in pages of 4 -> 2 reads; events: 12 rows -> 4 reads
        assert_eq!(store.reads(), 6);
    }

    #[test]
    fn test_day_by_day_paging_reads_same_data() {
        let store = store(3);
        let window = TimeWindow::new(base(), base() + Duration::days(3)).unwrap();
        let fetcher = DataFetcher::new(chrono_tz::UTC, 3, PagingStrategy::DayByDay);
        let data = fetcher.read_data(&store, &window).unwrap();
        assert_eq!(data.num_trip_occurrences(), 6);
        // 3 day windows for each record kind
        assert_eq!(store.reads(), 6);
    }

    #[test]
    fn test_empty_window_is_not_an_error() {
        let store = store(1);
        let begin = base() + Duration::days(10);
        let window = TimeWindow::new(begin, begin + Duration::days(1)).unwrap();
        let fetcher = DataFetcher::new(chrono_tz::UTC, 3, PagingStrategy::DayByDay);
        let data = fetcher.read_data(&store, &window).unwrap();
        assert!(data.is_empty());
        // arrivals/departures are not read when there are no matches
        assert_eq!(store.reads(), 1);
    }

    #[test]
    fn test_read_arrival_departures_only() {
        let store = store(2);
        let window = TimeWindow::new(base(), base() + Duration::days(2)).unwrap();
        let fetcher = DataFetcher::new(chrono_tz::UTC, 3, PagingStrategy::Offset { page_size: 100 });
        let data = fetcher.read_arrival_departures(&store, &window).unwrap();
        assert_eq!(data.num_trip_occurrences(), 4);
        assert!(data.matches.is_empty());
        assert_eq!(store.reads(), 1);
    }
}
