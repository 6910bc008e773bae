use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::FetchError;
use crate::config::FetcherConfig;

/// half-open interval `[begin, end)` of historical data to read.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeWindow {
    pub begin: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(begin: DateTime<Utc>, end: DateTime<Utc>) -> Result<TimeWindow, FetchError> {
        if begin >= end {
            return Err(FetchError::InvalidWindow { begin, end });
        }
        Ok(TimeWindow { begin, end })
    }

    pub fn contains(&self, time: &DateTime<Utc>) -> bool {
        self.begin <= *time && *time < self.end
    }

    /// consecutive windows of at most one day covering this window. the final
    /// window may be shorter than a day.
    pub fn days(&self) -> Vec<TimeWindow> {
        let mut result = vec![];
        let mut begin = self.begin;
        while begin < self.end {
            let end = std::cmp::min(begin + Duration::days(1), self.end);
            result.push(TimeWindow { begin, end });
            begin = end;
        }
        result
    }
}

impl std::fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.begin.to_rfc3339(), self.end.to_rfc3339())
    }
}

/// rows requested from an event store in one read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PageRequest {
    Offset { offset: usize, limit: usize },
    /// every row in the requested window
    Unbounded,
}

/// how a large window is split into reads.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum PagingStrategy {
    /// offset/limit pages over the whole window
    Offset { page_size: usize },
    /// one unbounded read per day, for stores where large offsets degrade
    DayByDay,
}

impl From<&FetcherConfig> for PagingStrategy {
    fn from(value: &FetcherConfig) -> Self {
        if value.page_db_reads {
            PagingStrategy::Offset {
                page_size: value.page_size,
            }
        } else {
            PagingStrategy::DayByDay
        }
    }
}
