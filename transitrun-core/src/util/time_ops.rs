use chrono::{DateTime, Datelike, Duration, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

pub const APP_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// ordinal day of the service day an instant belongs to, in the agency timezone.
/// instants earlier than `offset_hours` past local midnight belong to the previous
/// service day.
pub fn service_day_of_year(time: &DateTime<Utc>, timezone: &Tz, offset_hours: i64) -> u32 {
    let local = time.with_timezone(timezone) - Duration::hours(offset_hours);
    local.ordinal()
}

/// parses a local datetime in [`APP_DATETIME_FORMAT`] within the given timezone.
pub fn parse_local_datetime(value: &str, timezone: &Tz) -> Result<DateTime<Utc>, String> {
    let naive = NaiveDateTime::parse_from_str(value, APP_DATETIME_FORMAT)
        .map_err(|e| format!("invalid datetime '{value}', expected {APP_DATETIME_FORMAT}: {e}"))?;
    timezone
        .from_local_datetime(&naive)
        .earliest()
        .map(|t| t.with_timezone(&Utc))
        .ok_or_else(|| format!("datetime '{value}' does not exist in timezone {timezone}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_day_offset() {
        let tz: Tz = chrono_tz::UTC;
        let t1 = Utc.with_ymd_and_hms(2024, 1, 2, 2, 59, 0).unwrap();
        let t2 = Utc.with_ymd_and_hms(2024, 1, 2, 3, 0, 0).unwrap();
        // 02:59 still belongs to january 1st
        assert_eq!(service_day_of_year(&t1, &tz, 3), 1);
        assert_eq!(service_day_of_year(&t2, &tz, 3), 2);
    }

    #[test]
    fn test_parse_local_datetime() {
        let tz = chrono_tz::America::Denver;
        let t = parse_local_datetime("2024-07-01 08:00:00", &tz).unwrap();
        assert_eq!(t, Utc.with_ymd_and_hms(2024, 7, 1, 14, 0, 0).unwrap());
        assert!(parse_local_datetime("07/01/2024", &tz).is_err());
    }
}
