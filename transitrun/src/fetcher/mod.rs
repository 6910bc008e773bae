mod data_fetcher;
mod event_store;
mod fetch_error;
mod historical_data;
mod memory_store;
mod paging;

pub use data_fetcher::DataFetcher;
pub use event_store::{EventStore, HistoricalRecord, RecordKind};
pub use fetch_error::FetchError;
pub use historical_data::HistoricalData;
pub use memory_store::InMemoryEventStore;
pub use paging::{PageRequest, PagingStrategy, TimeWindow};
