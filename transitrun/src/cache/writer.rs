use itertools::Itertools;
use transitrun_core::model::RunTimesForRoutes;

use super::{CacheError, RunTimeCache};

pub const WRITE_BATCH_SIZE: usize = 100;

/// persistence sink for run time records.
pub trait RunTimeWriter {
    fn write_batch(&mut self, records: &[RunTimesForRoutes]) -> Result<(), CacheError>;
}

/// the records of the cache that may be persisted: records without a start time are
/// skipped and records whose stops repeat elsewhere in the cache are deduplicated.
pub fn prepare_for_write(cache: &RunTimeCache) -> Vec<RunTimesForRoutes> {
    let mut skipped = 0;
    let records = cache
        .records()
        .filter_map(|record| {
            if !RunTimeCache::is_valid(record) {
                skipped += 1;
                None
            } else if cache.contains_duplicate_stops(record) {
                Some(record.clone())
            } else {
                Some(cache.deduplicate(record))
            }
        })
        .sorted_by(|a, b| {
            (a.start_time, &a.trip_id, &a.vehicle_id).cmp(&(b.start_time, &b.trip_id, &b.vehicle_id))
        })
        .collect_vec();
    if skipped > 0 {
        log::warn!("skipped {skipped} run time records without a start time");
    }
    records
}

/// writes the records in batches of [`WRITE_BATCH_SIZE`], returning the count written.
/// a failed batch is retried one record at a time and records failing again are
/// dropped with an error log.
pub fn write_in_batches(
    writer: &mut dyn RunTimeWriter,
    records: &[RunTimesForRoutes],
) -> Result<usize, CacheError> {
    let mut written = 0;
    for (i, batch) in records.chunks(WRITE_BATCH_SIZE).enumerate() {
        log::debug!("writing run time batch {i} with {} records", batch.len());
        match writer.write_batch(batch) {
            Ok(()) => written += batch.len(),
            Err(e) => {
                log::warn!("run time batch {i} failed, retrying records individually: {e}");
                for record in batch {
                    match writer.write_batch(std::slice::from_ref(record)) {
                        Ok(()) => written += 1,
                        Err(e) => log::error!(
                            "dropping run time of trip {} vehicle {}: {e}",
                            record.trip_id,
                            record.vehicle_id
                        ),
                    }
                }
            }
        }
    }
    Ok(written)
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use transitrun_core::model::{RunTimeRouteKey, RunTimesForStops};

    #[derive(Default)]
    struct VecWriter {
        batches: Vec<usize>,
    }

    impl RunTimeWriter for VecWriter {
        fn write_batch(&mut self, records: &[RunTimesForRoutes]) -> Result<(), CacheError> {
            self.batches.push(records.len());
            Ok(())
        }
    }

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(secs * 1000).unwrap()
    }

    fn record(trip_id: &str, start: Option<DateTime<Utc>>, stop_secs: &[i64]) -> RunTimesForRoutes {
        let mut r = RunTimesForRoutes::new(&RunTimeRouteKey::new(1, trip_id, start, "v1"));
        r.run_times_for_stops = stop_secs
            .iter()
            .enumerate()
            .map(|(i, s)| RunTimesForStops {
                stop_path_id: format!("sp{i}"),
                stop_path_index: i,
                config_rev: 1,
                time: t(*s),
                prev_stop_departure_time: None,
                scheduled_time: None,
                scheduled_prev_stop_departure_time: None,
                run_time_msec: None,
                dwell_time_msec: None,
                speed: None,
                last_stop: false,
                time_point: false,
            })
            .collect();
        r
    }

    #[test]
    fn test_prepare_skips_invalid_and_deduplicates() {
        let mut cache = RunTimeCache::new();
        cache.absorb(record("t1", Some(t(0)), &[0, 10]));
        cache.absorb(record("t2", Some(t(5)), &[0, 20]));
        cache.absorb(record("t3", None, &[100]));
        let prepared = prepare_for_write(&cache);
        assert_eq!(prepared.len(), 2);
        assert_eq!(prepared[0].trip_id, "t1");
        // stop 0 at t=0 was reported by both t1 and t2
        assert_eq!(prepared[0].run_times_for_stops.len(), 1);
        assert_eq!(prepared[1].run_times_for_stops.len(), 1);
    }

    #[test]
    fn test_batches_of_one_hundred() {
        let records: Vec<_> = (0..250)
            .map(|i| record(&format!("t{i}"), Some(t(i)), &[]))
            .collect();
        let mut writer = VecWriter::default();
        let written = write_in_batches(&mut writer, &records).unwrap();
        assert_eq!(written, 250);
        assert_eq!(writer.batches, vec![100, 100, 50]);
    }

    /// rejects any batch containing the trip "bad".
    #[derive(Default)]
    struct PickyWriter {
        written: Vec<String>,
    }

    impl RunTimeWriter for PickyWriter {
        fn write_batch(&mut self, records: &[RunTimesForRoutes]) -> Result<(), CacheError> {
            if records.iter().any(|r| r.trip_id == "bad") {
                return Err(CacheError::Write(String::from("constraint violation")));
            }
            self.written.extend(records.iter().map(|r| r.trip_id.clone()));
            Ok(())
        }
    }

    #[test]
    fn test_failed_batch_retried_per_record() {
        let records = vec![
            record("a", Some(t(0)), &[]),
            record("bad", Some(t(1)), &[]),
            record("c", Some(t(2)), &[]),
        ];
        let mut writer = PickyWriter::default();
        let written = write_in_batches(&mut writer, &records).unwrap();
        assert_eq!(written, 2);
        assert_eq!(writer.written, vec!["a", "c"]);
    }
}
