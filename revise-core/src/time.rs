//! Time utilities: wall-clock times, planning days, and timezone-aware localization.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MINUTES_PER_DAY: u16 = 24 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid clock time '{0}' (expected HH:MM)")]
pub struct ParseClockError(pub String);

/// Time of day as minutes since midnight. Serialized as 24-hour `HH:MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClockTime(u16);

impl ClockTime {
    pub const MIDNIGHT: ClockTime = ClockTime(0);

    pub fn from_hm(hour: u16, minute: u16) -> Option<Self> {
        if hour < 24 && minute < 60 {
            Some(Self(hour * 60 + minute))
        } else {
            None
        }
    }

    pub fn from_minutes(minutes: u16) -> Option<Self> {
        (minutes < MINUTES_PER_DAY).then_some(Self(minutes))
    }

    pub fn minutes(self) -> u16 {
        self.0
    }

    pub fn hour(self) -> u16 {
        self.0 / 60
    }

    pub fn minute(self) -> u16 {
        self.0 % 60
    }

    pub fn to_naive_time(self) -> NaiveTime {
        // Always in range: constructors guarantee < 24:00.
        NaiveTime::from_hms_opt(self.hour().into(), self.minute().into(), 0).unwrap_or(NaiveTime::MIN)
    }
}

impl FromStr for ClockTime {
    type Err = ParseClockError;

    /// Accepts `H:MM`, `HH:MM` and the `HH:MM:SS` form Postgres `time` columns produce.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseClockError(s.to_string());
        let trimmed = s.trim();
        let time = NaiveTime::parse_from_str(trimmed, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M:%S"))
            .map_err(|_| err())?;
        // chrono also reads a single minute digit ("12:5"); require two.
        let two_digit_minutes = trimmed
            .split(':')
            .nth(1)
            .is_some_and(|m| m.len() == 2 && m.bytes().all(|b| b.is_ascii_digit()));
        if !two_digit_minutes {
            return Err(err());
        }
        // Leap seconds ("23:59:60") still land inside 23:59.
        ClockTime::from_hm(time.hour() as u16, time.minute() as u16).ok_or_else(err)
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

impl TryFrom<String> for ClockTime {
    type Error = ParseClockError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ClockTime> for String {
    fn from(value: ClockTime) -> Self {
        value.to_string()
    }
}

/// Parse an IANA timezone name such as "Europe/London".
pub fn parse_timezone(name: &str) -> Option<Tz> {
    name.trim().parse().ok()
}

/// Convert an absolute instant into wall-clock time in `tz`.
pub fn localize(instant: DateTime<Utc>, tz: Tz) -> NaiveDateTime {
    instant.with_timezone(&tz).naive_local()
}

/// Resolve a local date + clock time in `tz` to UTC.
///
/// Returns `None` for local times that do not exist or are ambiguous (DST transitions).
pub fn local_to_utc(date: NaiveDate, time: NaiveTime, tz: Tz) -> Option<DateTime<Utc>> {
    tz.from_local_datetime(&date.and_time(time))
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Minutes since midnight of a local datetime.
pub fn minute_of_day(dt: &NaiveDateTime) -> u16 {
    (dt.hour() * 60 + dt.minute()) as u16
}

/// Every date in the closed range `[start, end]`.
pub fn days_inclusive(start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    start.iter_days().take_while(move |d| *d <= end)
}

/// Parse a weekday label ("Monday", "mon", " TUESDAY ").
pub fn parse_weekday(label: &str) -> Option<Weekday> {
    label.trim().parse().ok()
}

pub fn is_school_day(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}
