use chrono::{DateTime, Datelike, Duration, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ServiceType {
    Weekday,
    Saturday,
    Sunday,
}

impl From<Weekday> for ServiceType {
    fn from(value: Weekday) -> Self {
        match value {
            Weekday::Sat => ServiceType::Saturday,
            Weekday::Sun => ServiceType::Sunday,
            _ => ServiceType::Weekday,
        }
    }
}

impl std::fmt::Display for ServiceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ServiceType::Weekday => "WEEKDAY",
            ServiceType::Saturday => "SATURDAY",
            ServiceType::Sunday => "SUNDAY",
        };
        write!(f, "{s}")
    }
}

pub trait ServiceTypeClassifier: Sync {
    /// classifies a trip by its local start time and scheduled start (seconds into
    /// the service day).
    fn service_type(&self, start_time: &DateTime<Tz>, scheduled_start_secs: i64) -> ServiceType;
}

/// classifies by calendar day. trips scheduled before 06:00 are moved six hours later
/// and trips after 18:00 six hours earlier so that service running past midnight is
/// attributed to the day it started on.
#[derive(Clone, Copy, Debug, Default)]
pub struct CalendarServiceTypeClassifier;

const SHIFT_HOURS: i64 = 6;
const EARLY_BOUNDARY_SECS: i64 = 6 * 3600;
const LATE_BOUNDARY_SECS: i64 = 18 * 3600;

impl ServiceTypeClassifier for CalendarServiceTypeClassifier {
    fn service_type(&self, start_time: &DateTime<Tz>, scheduled_start_secs: i64) -> ServiceType {
        let adjusted = if scheduled_start_secs < EARLY_BOUNDARY_SECS {
            *start_time + Duration::hours(SHIFT_HOURS)
        } else if scheduled_start_secs > LATE_BOUNDARY_SECS {
            *start_time - Duration::hours(SHIFT_HOURS)
        } else {
            *start_time
        };
        ServiceType::from(adjusted.weekday())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_weekdays() {
        let tz = chrono_tz::America::New_York;
        // 2024-06-07 is a Friday
        let friday = tz.with_ymd_and_hms(2024, 6, 7, 12, 0, 0).unwrap();
        let saturday = tz.with_ymd_and_hms(2024, 6, 8, 12, 0, 0).unwrap();
        let sunday = tz.with_ymd_and_hms(2024, 6, 9, 12, 0, 0).unwrap();
        let c = CalendarServiceTypeClassifier;
        assert_eq!(c.service_type(&friday, 12 * 3600), ServiceType::Weekday);
        assert_eq!(c.service_type(&saturday, 12 * 3600), ServiceType::Saturday);
        assert_eq!(c.service_type(&sunday, 12 * 3600), ServiceType::Sunday);
    }

    #[test]
    fn test_late_night_trip_keeps_starting_day() {
        let tz = chrono_tz::America::New_York;
        // scheduled at 23:30 on friday's service, observed just after midnight saturday
        let observed = tz.with_ymd_and_hms(2024, 6, 8, 0, 10, 0).unwrap();
        let c = CalendarServiceTypeClassifier;
        assert_eq!(c.service_type(&observed, 23 * 3600 + 1800), ServiceType::Weekday);
    }
}
