use std::{
    sync::mpsc::{self, Receiver, Sender},
    thread::{self, JoinHandle},
};

use transitrun_core::model::RunTimesForRoutes;

use super::{CacheError, RunTimeCache};

enum CacheMessage {
    Submit(Box<RunTimesForRoutes>),
    Snapshot(Sender<RunTimeCache>),
}

/// owns a [`RunTimeCache`] on a dedicated thread. producers on any thread submit
/// records through a [`RunTimeCacheHandle`]; the actor merges them one at a time.
pub struct RunTimeCacheActor {
    cache: RunTimeCache,
    inbox: Receiver<CacheMessage>,
}

/// cloneable sending side of a running [`RunTimeCacheActor`].
#[derive(Clone)]
pub struct RunTimeCacheHandle {
    sender: Sender<CacheMessage>,
}

impl RunTimeCacheActor {
    /// starts the actor thread. the thread ends once every handle is dropped and
    /// yields the final cache through the join handle.
    pub fn spawn() -> (RunTimeCacheHandle, JoinHandle<RunTimeCache>) {
        let (sender, inbox) = mpsc::channel();
        let actor = RunTimeCacheActor {
            cache: RunTimeCache::new(),
            inbox,
        };
        let join = thread::spawn(move || actor.run());
        (RunTimeCacheHandle { sender }, join)
    }

    fn run(mut self) -> RunTimeCache {
        while let Ok(message) = self.inbox.recv() {
            match message {
                CacheMessage::Submit(record) => self.cache.absorb(*record),
                CacheMessage::Snapshot(reply) => {
                    if reply.send(self.cache.clone()).is_err() {
                        log::warn!("snapshot requester hung up before reply");
                    }
                }
            }
        }
        log::debug!("run time cache actor stopping with {} records", self.cache.len());
        self.cache
    }
}

impl RunTimeCacheHandle {
    pub fn submit(&self, record: RunTimesForRoutes) -> Result<(), CacheError> {
        self.sender
            .send(CacheMessage::Submit(Box::new(record)))
            .map_err(|_| CacheError::ChannelClosed)
    }

    /// a copy of the cache reflecting every record submitted before this call.
    pub fn snapshot(&self) -> Result<RunTimeCache, CacheError> {
        let (reply, response) = mpsc::channel();
        self.sender
            .send(CacheMessage::Snapshot(reply))
            .map_err(|_| CacheError::ChannelClosed)?;
        response.recv().map_err(|_| CacheError::ChannelClosed)
    }
}

/// waits for the actor to stop and returns its cache.
pub fn join_cache(join: JoinHandle<RunTimeCache>) -> Result<RunTimeCache, CacheError> {
    join.join()
        .map_err(|_| CacheError::ActorFailure(String::from("cache thread panicked")))
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::{TimeZone, Utc};
    use crate::cache::prepare_for_write;
    use transitrun_core::model::{RunTimeRouteKey, RunTimesForStops};

    fn record(trip_id: &str) -> RunTimesForRoutes {
        let start = Utc.timestamp_millis_opt(0).unwrap();
        RunTimesForRoutes::new(&RunTimeRouteKey::new(1, trip_id, Some(start), "v1"))
    }

    #[test]
    fn test_concurrent_submissions_are_all_merged() {
        let (handle, join) = RunTimeCacheActor::spawn();
        let producers: Vec<_> = (0..4)
            .map(|p| {
                let h = handle.clone();
                thread::spawn(move || {
                    for i in 0..25 {
                        h.submit(record(&format!("t{p}_{i}"))).unwrap();
                    }
                })
            })
            .collect();
        for p in producers {
            p.join().unwrap();
        }
        assert_eq!(handle.snapshot().unwrap().len(), 100);
        drop(handle);
        let cache = join_cache(join).unwrap();
        assert_eq!(cache.len(), 100);
    }

    #[test]
    fn test_resubmitting_same_key_keeps_one_record() {
        let (handle, join) = RunTimeCacheActor::spawn();
        handle.submit(record("t1")).unwrap();
        handle.submit(record("t1")).unwrap();
        drop(handle);
        assert_eq!(join_cache(join).unwrap().len(), 1);
    }

    #[test]
    fn test_resubmitted_trip_keeps_its_stops_for_writing() {
        let mut r = record("t1");
        r.dwell_time_msec = Some(5000);
        r.run_times_for_stops = (0..3)
            .map(|i| RunTimesForStops {
                stop_path_id: format!("sp{i}"),
                stop_path_index: i,
                config_rev: 1,
                time: Utc.timestamp_millis_opt(i as i64 * 60_000).unwrap(),
                prev_stop_departure_time: None,
                scheduled_time: None,
                scheduled_prev_stop_departure_time: None,
                run_time_msec: None,
                dwell_time_msec: None,
                speed: None,
                last_stop: i == 2,
                time_point: false,
            })
            .collect();
        let (handle, join) = RunTimeCacheActor::spawn();
        handle.submit(r.clone()).unwrap();
        handle.submit(r).unwrap();
        drop(handle);
        let prepared = prepare_for_write(&join_cache(join).unwrap());
        assert_eq!(prepared.len(), 1);
        assert_eq!(prepared[0].run_times_for_stops.len(), 3);
        assert_eq!(prepared[0].dwell_time_msec, Some(5000));
    }
}
