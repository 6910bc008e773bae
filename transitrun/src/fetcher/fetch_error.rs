use chrono::{DateTime, Utc};
use transitrun_core::model::ModelError;

#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    #[error("time window begins at {begin} which is not before its end {end}")]
    InvalidWindow {
        begin: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    #[error("failure reading from event store: {0}")]
    Store(String),
    #[error(transparent)]
    Model(#[from] ModelError),
}
