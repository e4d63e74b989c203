//! Weekly trigger for automatic pipeline runs

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Duration, NaiveDateTime, NaiveTime, Weekday};
use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic, PartialEq)]
#[error("Invalid schedule '{0}'")]
#[diagnostic(
    code(sigstat::schedule::parse),
    help("Use '<weekday> HH:MM', for example 'mon 08:00'")
)]
pub struct ScheduleError(pub String);

/// A fixed weekday and time of day
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeeklySchedule {
    pub weekday: Weekday,
    pub time: NaiveTime,
}

impl WeeklySchedule {
    /// The next occurrence strictly after `now`
    pub fn next_after(&self, now: NaiveDateTime) -> NaiveDateTime {
        let days_ahead = (7 + self.weekday.num_days_from_monday() as i64
            - now.weekday().num_days_from_monday() as i64)
            % 7;
        let candidate = (now.date() + Duration::days(days_ahead)).and_time(self.time);
        if candidate > now {
            candidate
        } else {
            candidate + Duration::days(7)
        }
    }
}

impl FromStr for WeeklySchedule {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ScheduleError(s.to_string());
        let mut parts = s.split_whitespace();
        let weekday = parts
            .next()
            .and_then(|d| d.parse::<Weekday>().ok())
            .ok_or_else(err)?;
        let time = parts
            .next()
            .and_then(|t| NaiveTime::parse_from_str(t, "%H:%M").ok())
            .ok_or_else(err)?;
        if parts.next().is_some() {
            return Err(err());
        }
        Ok(Self { weekday, time })
    }
}

impl fmt::Display for WeeklySchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.weekday, self.time.format("%H:%M"))
    }
}
