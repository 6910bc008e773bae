use std::path::PathBuf;

use transitrun_core::model::ModelError;

use crate::{
    cache::CacheError, config::ConfigError, fetcher::FetchError, runtime::RunTimeError,
    traveltimes::TravelTimeError,
};

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("invalid user input: {0}")]
    InvalidUserInput(String),
    #[error("failure reading {path}: {message}")]
    ReadError { path: PathBuf, message: String },
    #[error("failure writing {path}: {message}")]
    WriteError { path: PathBuf, message: String },
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    TravelTime(#[from] TravelTimeError),
    #[error(transparent)]
    RunTime(#[from] RunTimeError),
    #[error(transparent)]
    Cache(#[from] CacheError),
}
