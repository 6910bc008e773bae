use serde::{Deserialize, Serialize};
use uom::si::f64::Velocity;
use uom::si::velocity::{meter_per_second, mile_per_hour};

/// unit in which run time speeds are reported.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SpeedUnit {
    #[default]
    MetersPerSecond,
    MilesPerHour,
}

impl SpeedUnit {
    pub fn convert_meters_per_second(&self, mps: f64) -> f64 {
        let v = Velocity::new::<meter_per_second>(mps);
        match self {
            SpeedUnit::MetersPerSecond => v.get::<meter_per_second>(),
            SpeedUnit::MilesPerHour => v.get::<mile_per_hour>(),
        }
    }
}

/// speed in meters per second over `distance_meters` covered in `time_msec`.
/// None when the elapsed time is not positive.
pub fn meters_per_second(distance_meters: f64, time_msec: i64) -> Option<f64> {
    if time_msec <= 0 {
        return None;
    }
    Some(distance_meters / (time_msec as f64 / 1000.0))
}
