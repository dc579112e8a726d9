//! Date windows for ledger queries.
//!
//! All windows are inclusive on both ends and end no later than the last
//! instant of the report date. The lower bound is either the start of the
//! report date or the start of the legislative session containing it.

use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::key::session_year_of;
use crate::model::MismatchState;

/// Inclusive `[start, end]` range of timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateTimeRange {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl DateTimeRange {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, t: NaiveDateTime) -> bool {
        self.start <= t && t <= self.end
    }
}

pub fn report_start(report_date: NaiveDate) -> NaiveDateTime {
    report_date.and_time(NaiveTime::MIN)
}

pub fn report_end(report_date: NaiveDate) -> NaiveDateTime {
    // 23:59:59.999999999 is always representable
    report_date.and_time(
        NaiveTime::from_hms_nano_opt(23, 59, 59, 999_999_999).unwrap_or(NaiveTime::MIN),
    )
}

/// Midnight on January 1st of the session year containing `report_date`.
pub fn session_start(report_date: NaiveDate) -> NaiveDateTime {
    let year = u32::try_from(report_date.year()).map(session_year_of).unwrap_or(0);
    NaiveDate::from_ymd_opt(year as i32, 1, 1)
        .unwrap_or(report_date)
        .and_time(NaiveTime::MIN)
}

/// The active window: session start through the end of the report date.
pub fn session_window(report_date: NaiveDate) -> DateTimeRange {
    DateTimeRange::new(session_start(report_date), report_end(report_date))
}

pub fn report_day(report_date: NaiveDate) -> DateTimeRange {
    DateTimeRange::new(report_start(report_date), report_end(report_date))
}

/// Logical status a caller asks about. Each status selects a set of row
/// states and its own observed / first-seen windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MismatchStatus {
    New,
    Existing,
    Resolved,
    Open,
}

impl MismatchStatus {
    pub fn states(&self) -> BTreeSet<MismatchState> {
        match self {
            Self::New => BTreeSet::from([MismatchState::New]),
            Self::Existing => BTreeSet::from([MismatchState::Existing]),
            Self::Resolved => BTreeSet::from([MismatchState::Resolved]),
            Self::Open => BTreeSet::from([MismatchState::New, MismatchState::Existing]),
        }
    }

    pub fn observed_range(&self, report_date: NaiveDate) -> DateTimeRange {
        match self {
            Self::New | Self::Resolved => report_day(report_date),
            Self::Existing | Self::Open => session_window(report_date),
        }
    }

    pub fn first_seen_range(&self, report_date: NaiveDate) -> DateTimeRange {
        match self {
            Self::New => report_day(report_date),
            Self::Existing | Self::Resolved | Self::Open => session_window(report_date),
        }
    }
}

impl std::fmt::Display for MismatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::New => write!(f, "NEW"),
            Self::Existing => write!(f, "EXISTING"),
            Self::Resolved => write!(f, "RESOLVED"),
            Self::Open => write!(f, "OPEN"),
        }
    }
}

impl std::str::FromStr for MismatchStatus {
    type Err = crate::error::ReconError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "NEW" => Ok(Self::New),
            "EXISTING" => Ok(Self::Existing),
            "RESOLVED" => Ok(Self::Resolved),
            "OPEN" => Ok(Self::Open),
            other => Err(crate::error::ReconError::InvalidArgument(format!(
                "unknown mismatch status: '{other}'"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn session_starts_on_odd_year() {
        assert_eq!(session_start(date(2026, 6, 3)), date(2025, 1, 1).and_hms_opt(0, 0, 0).unwrap());
        assert_eq!(session_start(date(2025, 12, 31)), date(2025, 1, 1).and_hms_opt(0, 0, 0).unwrap());
    }

    #[test]
    fn report_day_is_inclusive() {
        let day = report_day(date(2025, 3, 2));
        assert!(day.contains(date(2025, 3, 2).and_hms_opt(0, 0, 0).unwrap()));
        assert!(day.contains(date(2025, 3, 2).and_hms_milli_opt(23, 59, 59, 999).unwrap()));
        assert!(!day.contains(date(2025, 3, 3).and_hms_opt(0, 0, 0).unwrap()));
    }

    #[test]
    fn status_windows() {
        let d = date(2026, 2, 10);
        assert_eq!(MismatchStatus::New.observed_range(d), report_day(d));
        assert_eq!(MismatchStatus::Open.observed_range(d), session_window(d));
        assert_eq!(MismatchStatus::Resolved.first_seen_range(d), session_window(d));
        assert_eq!(MismatchStatus::Open.states().len(), 2);
    }

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!("open".parse::<MismatchStatus>().unwrap(), MismatchStatus::Open);
        assert!("closed".parse::<MismatchStatus>().is_err());
    }
}
