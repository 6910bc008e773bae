use std::path::Path;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use transitrun_core::util::speed_ops::SpeedUnit;

use super::ConfigError;

/// options for travel time decomposition and aggregation.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TravelTimesConfig {
    /// stop paths longer than this are divided into multiple segments
    #[serde(default = "default_max_travel_time_segment_length")]
    pub max_travel_time_segment_length: f64,
    #[serde(default = "default_min_segment_speed_mps")]
    pub min_segment_speed_mps: f64,
    #[serde(default = "default_max_segment_speed_mps")]
    pub max_segment_speed_mps: f64,
    #[serde(default = "default_fraction_limit")]
    pub fraction_limit_for_stop_times: f64,
    #[serde(default = "default_fraction_limit")]
    pub fraction_limit_for_travel_times: f64,
    /// departures from the first stop earlier than scheduled are treated as on time
    #[serde(default = "default_true")]
    pub reset_early_terminal_departures: bool,
    /// pairs of events with larger schedule adherence are not sampled
    #[serde(default = "default_max_schedule_adherence_secs")]
    pub max_schedule_adherence_secs: i64,
    /// first stop samples further than this from schedule are not sampled
    #[serde(default = "default_max_sched_adh_for_first_stop_msec")]
    pub max_sched_adh_for_first_stop_msec: i64,
    #[serde(default = "default_std_dev_bias_for_first_stop")]
    pub std_dev_bias_for_first_stop: f64,
    /// subtracted from the first stop's stop time to account for boarding lead time
    #[serde(default = "default_stop_time_bias_for_first_stop_msec")]
    pub stop_time_bias_for_first_stop_msec: i64,
}

/// options for run time derivation and filtering.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct RunTimesConfig {
    #[serde(default = "default_min_segment_speed_mps")]
    pub min_stop_path_speed_mps: f64,
    #[serde(default = "default_max_segment_speed_mps")]
    pub max_stop_path_speed_mps: f64,
    #[serde(default)]
    pub speed_unit: SpeedUnit,
    /// replaces non-finite speeds. when absent such stops are dropped.
    #[serde(default)]
    pub clamping_speed: Option<f64>,
    #[serde(default = "default_true")]
    pub reset_early_terminal_departures: bool,
    #[serde(default = "default_max_schedule_adherence_secs")]
    pub max_schedule_adherence_secs: i64,
    #[serde(default = "default_true")]
    pub use_schedule_outlier_filter: bool,
    #[serde(default = "default_scale_of_elimination")]
    pub scale_of_elimination: f64,
    #[serde(default = "default_lower_bound_schedule_fraction")]
    pub lower_bound_schedule_fraction: f64,
    #[serde(default = "default_upper_bound_schedule_fraction")]
    pub upper_bound_schedule_fraction: f64,
}

/// options for reading historical data.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct FetcherConfig {
    /// offset/limit paging when true, day-by-day paging otherwise
    #[serde(default = "default_true")]
    pub page_db_reads: bool,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_day_boundary_offset_hours")]
    pub day_boundary_offset_hours: i64,
    #[serde(default = "default_timezone")]
    pub timezone: Tz,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct EngineConfig {
    #[serde(default)]
    pub travel_times: TravelTimesConfig,
    #[serde(default)]
    pub run_times: RunTimesConfig,
    #[serde(default)]
    pub fetcher: FetcherConfig,
}

fn default_max_travel_time_segment_length() -> f64 {
    250.0
}
fn default_min_segment_speed_mps() -> f64 {
    0.0
}
fn default_max_segment_speed_mps() -> f64 {
    27.0
}
fn default_fraction_limit() -> f64 {
    0.7
}
fn default_true() -> bool {
    true
}
fn default_max_schedule_adherence_secs() -> i64 {
    30 * 60
}
fn default_max_sched_adh_for_first_stop_msec() -> i64 {
    10 * 60 * 1000
}
fn default_std_dev_bias_for_first_stop() -> f64 {
    1.5
}
fn default_stop_time_bias_for_first_stop_msec() -> i64 {
    10_000
}
fn default_scale_of_elimination() -> f64 {
    1.5
}
fn default_lower_bound_schedule_fraction() -> f64 {
    0.5
}
fn default_upper_bound_schedule_fraction() -> f64 {
    2.0
}
fn default_page_size() -> usize {
    50_000
}
fn default_day_boundary_offset_hours() -> i64 {
    3
}
fn default_timezone() -> Tz {
    chrono_tz::UTC
}

impl Default for TravelTimesConfig {
    fn default() -> Self {
        Self {
            max_travel_time_segment_length: default_max_travel_time_segment_length(),
            min_segment_speed_mps: default_min_segment_speed_mps(),
            max_segment_speed_mps: default_max_segment_speed_mps(),
            fraction_limit_for_stop_times: default_fraction_limit(),
            fraction_limit_for_travel_times: default_fraction_limit(),
            reset_early_terminal_departures: default_true(),
            max_schedule_adherence_secs: default_max_schedule_adherence_secs(),
            max_sched_adh_for_first_stop_msec: default_max_sched_adh_for_first_stop_msec(),
            std_dev_bias_for_first_stop: default_std_dev_bias_for_first_stop(),
            stop_time_bias_for_first_stop_msec: default_stop_time_bias_for_first_stop_msec(),
        }
    }
}

impl Default for RunTimesConfig {
    fn default() -> Self {
        Self {
            min_stop_path_speed_mps: default_min_segment_speed_mps(),
            max_stop_path_speed_mps: default_max_segment_speed_mps(),
            speed_unit: SpeedUnit::default(),
            clamping_speed: None,
            reset_early_terminal_departures: default_true(),
            max_schedule_adherence_secs: default_max_schedule_adherence_secs(),
            use_schedule_outlier_filter: default_true(),
            scale_of_elimination: default_scale_of_elimination(),
            lower_bound_schedule_fraction: default_lower_bound_schedule_fraction(),
            upper_bound_schedule_fraction: default_upper_bound_schedule_fraction(),
        }
    }
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            page_db_reads: default_true(),
            page_size: default_page_size(),
            day_boundary_offset_hours: default_day_boundary_offset_hours(),
            timezone: default_timezone(),
        }
    }
}

fn invalid(key: &str, message: String) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        message,
    }
}

fn check_fraction(key: &str, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(invalid(key, format!("must be in (0, 1], found {value}")))
    }
}

fn check_speeds(min_key: &str, min: f64, max: f64) -> Result<(), ConfigError> {
    if min < 0.0 || max <= 0.0 || min > max {
        Err(invalid(
            min_key,
            format!("speed bounds [{min}, {max}] are not a valid non-negative range"),
        ))
    } else {
        Ok(())
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let tt = &self.travel_times;
        if tt.max_travel_time_segment_length.is_nan() || tt.max_travel_time_segment_length <= 0.0 {
            return Err(invalid(
                "travel_times.max_travel_time_segment_length",
                format!("must be positive, found {}", tt.max_travel_time_segment_length),
            ));
        }
        check_fraction(
            "travel_times.fraction_limit_for_stop_times",
            tt.fraction_limit_for_stop_times,
        )?;
        check_fraction(
            "travel_times.fraction_limit_for_travel_times",
            tt.fraction_limit_for_travel_times,
        )?;
        check_speeds(
            "travel_times.min_segment_speed_mps",
            tt.min_segment_speed_mps,
            tt.max_segment_speed_mps,
        )?;
        let rt = &self.run_times;
        check_speeds(
            "run_times.min_stop_path_speed_mps",
            rt.min_stop_path_speed_mps,
            rt.max_stop_path_speed_mps,
        )?;
        if rt.lower_bound_schedule_fraction > rt.upper_bound_schedule_fraction {
            return Err(invalid(
                "run_times.lower_bound_schedule_fraction",
                String::from("must not exceed upper_bound_schedule_fraction"),
            ));
        }
        if self.fetcher.page_size == 0 {
            return Err(invalid(
                "fetcher.page_size",
                String::from("must be greater than zero"),
            ));
        }
        Ok(())
    }
}

impl TryFrom<&Path> for EngineConfig {
    type Error = ConfigError;

    /// reads a TOML file. missing keys take their default values.
    fn try_from(path: &Path) -> Result<Self, Self::Error> {
        let read_error = |message: String| ConfigError::ReadError {
            path: path.to_owned(),
            message,
        };
        let config = config::Config::builder()
            .add_source(config::File::from(path))
            .build()
            .map_err(|e| read_error(e.to_string()))?;
        let result: EngineConfig = config
            .try_deserialize()
            .map_err(|e| read_error(format!("failed to deserialize: {e}")))?;
        result.validate()?;
        log::debug!("loaded engine configuration from {}", path.display());
        Ok(result)
    }
}
