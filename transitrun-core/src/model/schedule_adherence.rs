use serde::{Deserialize, Serialize};

use super::ArrivalDeparture;

/// signed difference between scheduled and actual time in milliseconds. positive
/// values mean the vehicle is early, negative values mean it is late.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct ScheduleAdherence(pub i64);

impl ScheduleAdherence {
    pub fn msec(&self) -> i64 {
        self.0
    }

    pub fn is_early(&self) -> bool {
        self.0 > 0
    }

    pub fn is_late(&self) -> bool {
        self.0 < 0
    }

    pub fn is_within_bounds(&self, allowable_early_msec: i64, allowable_late_msec: i64) -> bool {
        -allowable_late_msec <= self.0 && self.0 <= allowable_early_msec
    }
}

impl std::fmt::Display for ScheduleAdherence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let secs = self.0.abs() / 1000;
        let label = if self.is_late() { "late" } else { "early" };
        write!(f, "{}m{:02}s {label}", secs / 60, secs % 60)
    }
}

/// computes schedule adherence for an event.
pub trait ScheduleAdherenceCalculator: Sync {
    fn schedule_adherence(&self, event: &ArrivalDeparture) -> Option<ScheduleAdherence>;

    /// true when adherence is known and within `max_msec` either side of schedule.
    fn is_within_bounds(&self, event: &ArrivalDeparture, max_msec: i64) -> bool {
        self.schedule_adherence(event)
            .map(|adh| adh.is_within_bounds(max_msec, max_msec))
            .unwrap_or(false)
    }
}

/// derives adherence from the scheduled time carried on the event itself.
#[derive(Clone, Copy, Debug, Default)]
pub struct ScheduledTimeAdherence;

impl ScheduleAdherenceCalculator for ScheduledTimeAdherence {
    fn schedule_adherence(&self, event: &ArrivalDeparture) -> Option<ScheduleAdherence> {
        event
            .scheduled_time
            .map(|scheduled| ScheduleAdherence((scheduled - event.time).num_milliseconds()))
    }
}
