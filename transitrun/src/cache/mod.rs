mod cache_actor;
mod cache_error;
mod run_time_cache;
mod writer;

pub use cache_actor::{join_cache, RunTimeCacheActor, RunTimeCacheHandle};
pub use cache_error::CacheError;
pub use run_time_cache::RunTimeCache;
pub use writer::{prepare_for_write, write_in_batches, RunTimeWriter, WRITE_BATCH_SIZE};
