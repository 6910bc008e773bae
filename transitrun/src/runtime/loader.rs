use std::{
    sync::{Arc, Mutex},
    time::Instant,
};

use itertools::Itertools;
use kdam::{Bar, BarBuilder, BarExt};
use rayon::prelude::*;
use serde::Serialize;
use transitrun_core::model::{
    RunTimesForRoutes, ScheduleAdherenceCalculator, ServiceTypeClassifier, TripConfigProvider,
    TripOccurrenceKey,
};

use super::{RunTimeError, RunTimeExit, RunTimeProcessor};
use crate::{cache::RunTimeCache, fetcher::HistoricalData};

/// outcome counts of a batch load.
#[derive(Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoaderSummary {
    pub processed: usize,
    pub succeeded: usize,
    pub fell_through: usize,
    pub failed: usize,
}

/// builds run times for every trip occurrence of a batch of historical data. trip
/// occurrences are reduced in parallel; the resulting records are merged into the
/// cache on the calling thread.
pub struct RunTimeLoader<A, S> {
    processor: RunTimeProcessor<A, S>,
    parallelism: usize,
}

impl<A, S> RunTimeLoader<A, S>
where
    A: ScheduleAdherenceCalculator,
    S: ServiceTypeClassifier,
{
    pub fn new(processor: RunTimeProcessor<A, S>, parallelism: usize) -> Self {
        RunTimeLoader {
            processor,
            parallelism: std::cmp::max(1, parallelism),
        }
    }

    pub fn run(
        &self,
        data: &HistoricalData,
        provider: &dyn TripConfigProvider,
        cache: &mut RunTimeCache,
    ) -> Result<LoaderSummary, RunTimeError> {
        let timer = Instant::now();
        let keys: Vec<&TripOccurrenceKey> = data.arrival_departures.keys().sorted().collect();
        if keys.is_empty() {
            log::warn!("no trip occurrences to load run times for");
            return Ok(LoaderSummary::default());
        }
        let chunk_size = std::cmp::max(1, keys.len().div_ceil(self.parallelism));

        let bar: Arc<Mutex<Bar>> = Arc::new(Mutex::new(
            BarBuilder::default()
                .desc("run times")
                .total(keys.len())
                .animation("fillup")
                .build()
                .map_err(|e| RunTimeError::Internal(format!("failure building progress bar: {e}")))?,
        ));

        let results: Vec<(Option<RunTimesForRoutes>, Option<RunTimeExit>)> = keys
            .par_chunks(chunk_size)
            .map(|chunk| {
                chunk
                    .iter()
                    .map(|key| {
                        if let Ok(mut bar) = bar.clone().lock() {
                            let _ = bar.update(1);
                        }
                        let events = data.arrival_departures_for(key);
                        let result = self.processor.process_run_times_for_trip(
                            &key.trip_id,
                            &key.vehicle_id,
                            events,
                            provider,
                        );
                        match result.success {
                            true => (result.record, result.exit),
                            false => (None, None),
                        }
                    })
                    .collect_vec()
            })
            .collect_vec_list()
            .into_iter()
            .flat_map(|chunks| chunks.into_iter().flatten())
            .collect_vec();
        eprintln!(); // end progress bar

        let mut summary = LoaderSummary {
            processed: results.len(),
            ..Default::default()
        };
        for (record, exit) in results {
            match record {
                Some(record) => {
                    summary.succeeded += 1;
                    if exit == Some(RunTimeExit::FellThrough) {
                        summary.fell_through += 1;
                    }
                    cache.absorb(record);
                }
                None => summary.failed += 1,
            }
        }
        log::info!(
            "loaded run times for {} of {} trip occurrences ({} partial) in {} msec",
            summary.succeeded,
            summary.processed,
            summary.fell_through,
            timer.elapsed().as_millis()
        );
        Ok(summary)
    }
}
