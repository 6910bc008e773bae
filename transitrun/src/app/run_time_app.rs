use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use clap::{Args, Parser, Subcommand};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use transitrun_core::{model::InMemoryTripConfigProvider, stats, util::time_ops};

use super::{input_ops, output_ops, AppError};
use crate::{
    cache::{prepare_for_write, write_in_batches, RunTimeCache},
    config::EngineConfig,
    fetcher::{DataFetcher, InMemoryEventStore, TimeWindow},
    runtime::{run_time_filter, LoaderSummary, RunTimeLoader, RunTimeProcessor},
    traveltimes::{AggregationCounts, TravelTimesProcessor},
};

/// Command line tool deriving travel times and run times from historical transit
/// telemetry
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct RunTimeApp {
    #[command(subcommand)]
    pub op: RunTimeOperation,
}

/// inputs shared by every operation.
#[derive(Debug, Clone, Serialize, Deserialize, Args)]
pub struct HistoricalInputArgs {
    /// TOML engine configuration. defaults are used when not provided.
    #[arg(short, long)]
    pub configuration_file: Option<String>,

    /// JSON file with the list of trip configurations
    #[arg(short, long)]
    pub trips_file: String,

    /// CSV (optionally .gz) file of arrivals and departures
    #[arg(short, long)]
    pub arrival_departures_file: String,

    /// CSV (optionally .gz) file of position matches
    #[arg(short, long)]
    pub matches_file: Option<String>,

    /// start of the time window, local time "YYYY-mm-dd HH:MM:SS"
    #[arg(short, long)]
    pub begin: String,

    /// end of the time window (exclusive), local time "YYYY-mm-dd HH:MM:SS"
    #[arg(short, long)]
    pub end: String,

    /// agency timezone, overrides the configured one. for example "America/Denver".
    #[arg(long)]
    pub timezone: Option<String>,

    /// location on disk to write output files. if not provided,
    /// use the current working directory.
    #[arg(short, long)]
    pub output_directory: Option<String>,

    /// replace output files that already exist
    #[arg(long)]
    pub overwrite: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Subcommand)]
pub enum RunTimeOperation {
    /// aggregate per stop path stop times and segment travel times
    TravelTimes {
        #[command(flatten)]
        inputs: HistoricalInputArgs,
    },
    /// derive per trip run times, remove outliers and write the valid records
    RunTimes {
        #[command(flatten)]
        inputs: HistoricalInputArgs,

        /// number of threads processing trip occurrences. defaults to the rayon pool size.
        #[arg(long)]
        parallelism: Option<usize>,
    },
}

#[derive(Serialize, Debug)]
struct TravelTimesSummary {
    begin: DateTime<Utc>,
    end: DateTime<Utc>,
    trip_occurrences: usize,
    stop_paths: usize,
    counts: AggregationCounts,
}

#[derive(Serialize, Debug)]
struct RunTimesSummary {
    begin: DateTime<Utc>,
    end: DateTime<Utc>,
    loader: LoaderSummary,
    records_written: usize,
    trips_after_filter: usize,
    run_times_after_filter: usize,
    /// median of the filtered run times of each trip
    median_run_time_msec: BTreeMap<String, i64>,
}

/// everything an operation reads before processing.
struct LoadedInputs {
    config: EngineConfig,
    window: TimeWindow,
    provider: InMemoryTripConfigProvider,
    store: InMemoryEventStore,
    output_directory: PathBuf,
}

impl RunTimeOperation {
    pub fn run(&self) -> Result<(), AppError> {
        match self {
            RunTimeOperation::TravelTimes { inputs } => run_travel_times(inputs),
            RunTimeOperation::RunTimes {
                inputs,
                parallelism,
            } => run_run_times(inputs, parallelism.unwrap_or_else(rayon::current_num_threads)),
        }
    }
}

fn load_inputs(args: &HistoricalInputArgs) -> Result<LoadedInputs, AppError> {
    let mut config = match &args.configuration_file {
        Some(file) => EngineConfig::try_from(Path::new(file))?,
        None => EngineConfig::default(),
    };
    if let Some(tz) = &args.timezone {
        config.fetcher.timezone = tz
            .parse::<Tz>()
            .map_err(|e| AppError::InvalidUserInput(format!("timezone '{tz}': {e}")))?;
    }
    config.validate()?;
    let timezone = config.fetcher.timezone;
    let begin =
        time_ops::parse_local_datetime(&args.begin, &timezone).map_err(AppError::InvalidUserInput)?;
    let end =
        time_ops::parse_local_datetime(&args.end, &timezone).map_err(AppError::InvalidUserInput)?;
    let window = TimeWindow::new(begin, end)?;

    let trips = input_ops::read_trips(Path::new(&args.trips_file))?;
    let arrival_departures =
        input_ops::read_arrival_departures(Path::new(&args.arrival_departures_file))?;
    let matches = match &args.matches_file {
        Some(file) => input_ops::read_matches(Path::new(file), &trips)?,
        None => vec![],
    };
    log::info!("loaded {} trip configurations", trips.len());

    let output_directory = match &args.output_directory {
        Some(out) => PathBuf::from(out),
        None => PathBuf::from(""),
    };
    if !output_directory.as_os_str().is_empty() {
        output_ops::create_dirs(&output_directory)?;
    }
    Ok(LoadedInputs {
        config,
        window,
        provider: InMemoryTripConfigProvider::new(trips),
        store: InMemoryEventStore::new(arrival_departures, matches),
        output_directory,
    })
}

fn run_travel_times(args: &HistoricalInputArgs) -> Result<(), AppError> {
    let inputs = load_inputs(args)?;
    let processor = TravelTimesProcessor::new(inputs.config.clone());
    let result = processor.run(&inputs.store, &inputs.window, &inputs.provider)?;
    if result.is_empty() {
        log::warn!("no travel times derived for {}", inputs.window);
    }
    let rows: Vec<output_ops::TravelTimeRow> = result
        .travel_times
        .iter()
        .map(output_ops::TravelTimeRow::from)
        .collect();
    output_ops::serialize_into_csv(
        rows,
        output_ops::TRAVEL_TIMES_FILENAME,
        &inputs.output_directory,
        args.overwrite,
        "write travel times",
    )?;
    let summary = TravelTimesSummary {
        begin: inputs.window.begin,
        end: inputs.window.end,
        trip_occurrences: result.trip_occurrences,
        stop_paths: result.travel_times.len(),
        counts: result.counts,
    };
    output_ops::write_json(
        &summary,
        output_ops::TRAVEL_TIMES_SUMMARY_FILENAME,
        &inputs.output_directory,
        args.overwrite,
    )
}

fn run_run_times(args: &HistoricalInputArgs, parallelism: usize) -> Result<(), AppError> {
    let inputs = load_inputs(args)?;
    let fetcher = DataFetcher::from(&inputs.config.fetcher);
    let data = fetcher.read_arrival_departures(&inputs.store, &inputs.window)?;

    let processor =
        RunTimeProcessor::new(inputs.config.run_times.clone(), inputs.config.fetcher.timezone);
    let loader = RunTimeLoader::new(processor, parallelism);
    let mut cache = RunTimeCache::new();
    let loader_summary = loader.run(&data, &inputs.provider, &mut cache)?;

    let records = prepare_for_write(&cache);
    let records_written =
        match output_ops::JsonLinesRunTimeWriter::create(&inputs.output_directory, args.overwrite)? {
            Some(mut writer) => write_in_batches(&mut writer, &records)?,
            None => 0,
        };
    let filtered = run_time_filter::filter_run_times_for_routes(&records, &inputs.config.run_times);
    let median_run_time_msec = filtered
        .iter()
        .filter_map(|(trip_id, group)| {
            let sorted = group
                .iter()
                .filter_map(|r| r.run_time_msec())
                .sorted()
                .collect_vec();
            stats::percentile(&sorted, 50.0)
                .ok()
                .map(|median| (trip_id.clone(), median))
        })
        .collect();
    let summary = RunTimesSummary {
        begin: inputs.window.begin,
        end: inputs.window.end,
        loader: loader_summary,
        records_written,
        trips_after_filter: filtered.len(),
        run_times_after_filter: filtered.values().map(|v| v.len()).sum(),
        median_run_time_msec,
    };
    log::info!(
        "wrote {} run time records, {} complete run times over {} trips after filtering",
        summary.records_written,
        summary.run_times_after_filter,
        summary.trips_after_filter
    );
    output_ops::write_json(
        &summary,
        output_ops::RUN_TIMES_SUMMARY_FILENAME,
        &inputs.output_directory,
        args.overwrite,
    )
}
