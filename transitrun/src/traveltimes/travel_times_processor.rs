use std::time::Instant;

use itertools::Itertools;
use kdam::{BarBuilder, BarExt};
use transitrun_core::model::{TravelTimeInfoMap, TripConfigProvider};

use super::{AggregationCounts, TravelTimeAggregator, TravelTimeError};
use crate::{
    config::EngineConfig,
    fetcher::{DataFetcher, EventStore, HistoricalData, TimeWindow},
};

#[derive(Debug, Default)]
pub struct TravelTimesResult {
    pub travel_times: TravelTimeInfoMap,
    pub counts: AggregationCounts,
    pub trip_occurrences: usize,
}

impl TravelTimesResult {
    pub fn is_empty(&self) -> bool {
        self.travel_times.is_empty()
    }
}

/// reads historical data and derives travel times from it in one single-threaded
/// pass.
pub struct TravelTimesProcessor {
    config: EngineConfig,
}

impl TravelTimesProcessor {
    pub fn new(config: EngineConfig) -> TravelTimesProcessor {
        TravelTimesProcessor { config }
    }

    pub fn run(
        &self,
        store: &dyn EventStore,
        window: &TimeWindow,
        provider: &dyn TripConfigProvider,
    ) -> Result<TravelTimesResult, TravelTimeError> {
        let fetcher = DataFetcher::from(&self.config.fetcher);
        let data = fetcher.read_data(store, window)?;
        if data.is_empty() {
            log::error!("no historical data for {window}, nothing to do");
            return Ok(TravelTimesResult::default());
        }
        self.process(&data, provider)
    }

    /// aggregates already fetched data.
    pub fn process(
        &self,
        data: &HistoricalData,
        provider: &dyn TripConfigProvider,
    ) -> Result<TravelTimesResult, TravelTimeError> {
        let timer = Instant::now();
        let mut aggregator = TravelTimeAggregator::new(self.config.travel_times.clone());
        let mut bar = BarBuilder::default()
            .desc("travel times")
            .total(data.num_trip_occurrences())
            .animation("fillup")
            .build()
            .map_err(|e| TravelTimeError::Internal(format!("failure building progress bar: {e}")))?;

        for key in data.arrival_departures.keys().sorted() {
            let events = data.arrival_departures_for(key);
            let matches = data.matches_for(key);
            log::trace!("processing {} events, {} matches for {key}", events.len(), matches.len());
            aggregator.process_trip(events, matches);
            let _ = bar.update(1);
        }
        eprintln!(); // end progress bar

        let (travel_times, counts) = aggregator.build(provider);
        log::info!(
            "processed {} trip occurrences into travel times in {} msec",
            data.num_trip_occurrences(),
            timer.elapsed().as_millis()
        );
        Ok(TravelTimesResult {
            travel_times,
            counts,
            trip_occurrences: data.num_trip_occurrences(),
        })
    }
}
