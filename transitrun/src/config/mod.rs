mod config_error;
mod engine_config;

pub use config_error::ConfigError;
pub use engine_config::{EngineConfig, FetcherConfig, RunTimesConfig, TravelTimesConfig};
