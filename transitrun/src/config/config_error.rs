use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failure reading configuration file {path}: {message}")]
    ReadError { path: PathBuf, message: String },
    #[error("invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },
}
