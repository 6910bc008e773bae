//! writers for the files produced by the command line application.
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use csv::QuoteStyle;
use flate2::{write::GzEncoder, Compression};
use itertools::Itertools;
use kdam::tqdm;
use serde::Serialize;
use transitrun_core::model::{RunTimesForRoutes, TravelTimeInfo};

use super::AppError;
use crate::cache::{CacheError, RunTimeWriter};

pub const TRAVEL_TIMES_FILENAME: &str = "travel-times.csv.gz";
pub const TRAVEL_TIMES_SUMMARY_FILENAME: &str = "travel-times-summary.json";
pub const RUN_TIMES_FILENAME: &str = "run-times.jsonl";
pub const RUN_TIMES_SUMMARY_FILENAME: &str = "run-times-summary.json";

fn write_error(path: &Path, message: String) -> AppError {
    AppError::WriteError {
        path: path.to_owned(),
        message,
    }
}

/// one row of the travel times output. segment times are joined with '|'.
#[derive(Serialize, Debug)]
pub struct TravelTimeRow<'a> {
    pub trip_id: &'a str,
    pub stop_path_index: usize,
    pub stop_path_id: &'a str,
    pub stop_time_msec: Option<i64>,
    pub travel_time_segment_length: f64,
    pub number_of_segments: usize,
    pub travel_times_msec: String,
}

impl<'a> From<&'a TravelTimeInfo> for TravelTimeRow<'a> {
    fn from(info: &'a TravelTimeInfo) -> Self {
        TravelTimeRow {
            trip_id: &info.trip_id,
            stop_path_index: info.stop_path_index,
            stop_path_id: &info.stop_path_id,
            stop_time_msec: info.stop_time_msec,
            travel_time_segment_length: info.travel_time_segment_length,
            number_of_segments: info.number_of_segments(),
            travel_times_msec: info.travel_times_msec.iter().join("|"),
        }
    }
}

/// "mkdir -p" for the output directory.
pub fn create_dirs(path: &Path) -> Result<(), AppError> {
    if path.is_dir() {
        return Ok(());
    }
    std::fs::create_dir_all(path)
        .map_err(|e| write_error(path, format!("error building output directory: {e}")))
}

/// the path a file will be written to, or None when it exists and may not be
/// overwritten.
fn output_path(directory: &Path, filename: &str, overwrite: bool) -> Option<PathBuf> {
    let filepath = directory.join(filename);
    if filepath.exists() && !overwrite {
        log::warn!("{} exists and overwrite is not set, skipping", filepath.display());
        return None;
    }
    Some(filepath)
}

/// builds a gzip compressed csv writer respecting the user's overwrite preference.
fn create_writer(
    directory: &Path,
    filename: &str,
    overwrite: bool,
) -> Result<Option<csv::Writer<GzEncoder<File>>>, AppError> {
    let filepath = match output_path(directory, filename, overwrite) {
        Some(p) => p,
        None => return Ok(None),
    };
    let file = File::create(&filepath).map_err(|e| write_error(&filepath, e.to_string()))?;
    let buffer = GzEncoder::new(file, Compression::default());
    let writer = csv::WriterBuilder::new()
        .has_headers(true)
        .quote_style(QuoteStyle::Necessary)
        .from_writer(buffer);
    Ok(Some(writer))
}

pub fn serialize_into_csv<I>(
    iterable: I,
    filename: &str,
    output_directory: &Path,
    overwrite: bool,
    desc: &str,
) -> Result<(), AppError>
where
    I: IntoIterator,
    I::IntoIter: ExactSizeIterator,
    I::Item: Serialize,
{
    let filepath = output_directory.join(filename);
    let mut writer = match create_writer(output_directory, filename, overwrite)? {
        Some(w) => w,
        None => return Ok(()),
    };
    let iter = iterable.into_iter();
    let total = iter.len();
    for element in tqdm!(iter, total = total, desc = desc) {
        writer
            .serialize(element)
            .map_err(|e| write_error(&filepath, e.to_string()))?;
    }
    eprintln!();
    writer
        .flush()
        .map_err(|e| write_error(&filepath, format!("failed to flush: {e}")))?;
    Ok(())
}

pub fn write_json<T: Serialize>(
    value: &T,
    filename: &str,
    output_directory: &Path,
    overwrite: bool,
) -> Result<(), AppError> {
    let filepath = match output_path(output_directory, filename, overwrite) {
        Some(p) => p,
        None => return Ok(()),
    };
    let file = File::create(&filepath).map_err(|e| write_error(&filepath, e.to_string()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), value)
        .map_err(|e| write_error(&filepath, e.to_string()))
}

/// writes run time records as newline-delimited json.
pub struct JsonLinesRunTimeWriter<W: Write> {
    out: W,
}

impl JsonLinesRunTimeWriter<BufWriter<File>> {
    pub fn create(
        output_directory: &Path,
        overwrite: bool,
    ) -> Result<Option<JsonLinesRunTimeWriter<BufWriter<File>>>, AppError> {
        let filepath = match output_path(output_directory, RUN_TIMES_FILENAME, overwrite) {
            Some(p) => p,
            None => return Ok(None),
        };
        let file = File::create(&filepath).map_err(|e| write_error(&filepath, e.to_string()))?;
        Ok(Some(JsonLinesRunTimeWriter::new(BufWriter::new(file))))
    }
}

impl<W: Write> JsonLinesRunTimeWriter<W> {
    pub fn new(out: W) -> Self {
        JsonLinesRunTimeWriter { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> RunTimeWriter for JsonLinesRunTimeWriter<W> {
    fn write_batch(&mut self, records: &[RunTimesForRoutes]) -> Result<(), CacheError> {
        for record in records {
            serde_json::to_writer(&mut self.out, record)
                .map_err(|e| CacheError::Write(e.to_string()))?;
            self.out
                .write_all(b"\n")
                .map_err(|e| CacheError::Write(e.to_string()))?;
        }
        self.out.flush().map_err(|e| CacheError::Write(e.to_string()))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::{TimeZone, Utc};
    use transitrun_core::model::RunTimeRouteKey;

    #[test]
    fn test_travel_time_row() {
        let info = TravelTimeInfo {
            trip_id: "t1".to_string(),
            stop_path_index: 2,
            stop_path_id: "sp2".to_string(),
            stop_time_msec: Some(5000),
            travel_times_msec: vec![20_000, 21_000],
            travel_time_segment_length: 250.0,
        };
        let row = TravelTimeRow::from(&info);
        assert_eq!(row.travel_times_msec, "20000|21000");
        assert_eq!(row.number_of_segments, 2);
    }

    #[test]
    fn test_json_lines_writer() {
        let start = Utc.timestamp_millis_opt(0).unwrap();
        let records: Vec<_> = ["t1", "t2"]
            .iter()
            .map(|t| RunTimesForRoutes::new(&RunTimeRouteKey::new(1, t, Some(start), "v1")))
            .collect();
        let mut writer = JsonLinesRunTimeWriter::new(Vec::new());
        writer.write_batch(&records).unwrap();
        let text = String::from_utf8(writer.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: RunTimesForRoutes = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.trip_id, "t1");
    }
}
