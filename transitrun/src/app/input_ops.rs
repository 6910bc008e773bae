//! readers for the files handed to the command line application.
use std::{
    fs::File,
    io::{BufReader, Read},
    path::Path,
};

use flate2::read::GzDecoder;
use itertools::Itertools;
use serde::de::DeserializeOwned;
use transitrun_core::model::{ArrivalDeparture, PositionMatch, TripConfig};

use super::AppError;

fn read_error(path: &Path, message: String) -> AppError {
    AppError::ReadError {
        path: path.to_owned(),
        message,
    }
}

/// opens a file, decompressing it when the name ends in `.gz`.
fn open(path: &Path) -> Result<Box<dyn Read>, AppError> {
    let file = File::open(path).map_err(|e| read_error(path, e.to_string()))?;
    let is_gzip = path.extension().map(|ext| ext == "gz").unwrap_or(false);
    if is_gzip {
        Ok(Box::new(GzDecoder::new(BufReader::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// deserializes every row of a csv file with headers.
pub fn read_csv<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(open(path)?);
    reader
        .deserialize()
        .enumerate()
        .map(|(idx, row)| row.map_err(|e| read_error(path, format!("row {}: {e}", idx + 1))))
        .collect()
}

pub fn read_trips(path: &Path) -> Result<Vec<TripConfig>, AppError> {
    serde_json::from_reader(open(path)?)
        .map_err(|e| read_error(path, format!("failed to deserialize trips: {e}")))
}

/// reads arrivals and departures, rejecting any malformed row.
pub fn read_arrival_departures(path: &Path) -> Result<Vec<ArrivalDeparture>, AppError> {
    let events: Vec<ArrivalDeparture> = read_csv(path)?;
    let (valid, errors): (Vec<ArrivalDeparture>, Vec<String>) = events
        .into_iter()
        .map(|e| match e.validate() {
            Ok(()) => Ok(e),
            Err(err) => Err(format!("{e}: {err}")),
        })
        .partition_result();
    if !errors.is_empty() {
        return Err(read_error(path, errors.iter().join("\n  ")));
    }
    log::info!("read {} arrivals and departures from {}", valid.len(), path.display());
    Ok(valid)
}

/// reads position matches. a match whose distance lies outside its stop path is
/// rejected when the stop path is known to the trips.
pub fn read_matches(path: &Path, trips: &[TripConfig]) -> Result<Vec<PositionMatch>, AppError> {
    let matches: Vec<PositionMatch> = read_csv(path)?;
    let (valid, errors): (Vec<PositionMatch>, Vec<String>) = matches
        .into_iter()
        .map(|m| {
            let length = trips
                .iter()
                .find(|t| t.trip_id == m.trip_id)
                .and_then(|t| t.stop_path(m.stop_path_index))
                .map(|sp| sp.length);
            match m.validate(length) {
                Ok(()) => Ok(m),
                Err(err) => Err(err.to_string()),
            }
        })
        .partition_result();
    if !errors.is_empty() {
        return Err(read_error(path, errors.iter().join("\n  ")));
    }
    log::info!("read {} position matches from {}", valid.len(), path.display());
    Ok(valid)
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Write;
    use transitrun_core::model::ArrivalDepartureKind;

    fn write_tmp(name: &str, contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("transitrun-{}-{name}", std::process::id()));
        let mut file = File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_read_arrival_departures_csv() {
        let csv = "kind,trip_id,vehicle_id,service_id,route_id,stop_id,stop_path_id,stop_path_index,config_rev,time,scheduled_time,dwell_time_msec,stop_path_length\n\
                   departure,t1,v1,wkdy,r1,s0,sp0,0,1,1712131200000,1712131200000,,\n\
                   arrival,t1,v1,wkdy,r1,s1,sp1,1,1,1712131260000,,,600.5\n";
        let path = write_tmp("ads.csv", csv);
        let events = read_arrival_departures(&path).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, ArrivalDepartureKind::Departure);
        assert!(events[0].scheduled_time.is_some());
        assert_eq!(events[1].scheduled_time, None);
        assert_eq!(events[1].stop_path_length, Some(600.5));
        assert_eq!(events[1].dwell_time_msec, None);
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_malformed_length_is_rejected() {
        let csv = "kind,trip_id,vehicle_id,service_id,stop_path_index,config_rev,time,stop_path_length\n\
                   arrival,t1,v1,wkdy,1,1,1712131260000,abc\n";
        let path = write_tmp("bad.csv", csv);
        assert!(read_arrival_departures(&path).is_err());
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_match_outside_stop_path_is_rejected() {
        let trips = read_trips(&write_tmp(
            "trips.json",
            r#"[{"trip_id": "t1", "service_id": "wkdy", "start_time_secs": 0, "end_time_secs": 60,
                 "stop_paths": [{"id": "sp0", "stop_id": "s0", "length": 0.0},
                                {"id": "sp1", "stop_id": "s1", "length": 100.0}]}]"#,
        ))
        .unwrap();
        let csv = "trip_id,vehicle_id,service_id,stop_path_index,time,distance_along_stop_path\n\
                   t1,v1,wkdy,1,1712131230000,50.0\n";
        let path = write_tmp("matches.csv", csv);
        assert_eq!(read_matches(&path, &trips).unwrap().len(), 1);
        let csv = "trip_id,vehicle_id,service_id,stop_path_index,time,distance_along_stop_path\n\
                   t1,v1,wkdy,1,1712131230000,150.0\n";
        let path = write_tmp("matches_bad.csv", csv);
        assert!(read_matches(&path, &trips).is_err());
    }
}
