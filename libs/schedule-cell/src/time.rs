//! Wall-clock arithmetic in whole minutes since midnight.
//!
//! Dates are calendar dates (`YYYY-MM-DD`), never instants, and times are
//! `HH:mm` strings on the wire. The stored timezone tag never enters here.

use chrono::{Datelike, NaiveDate};
use thiserror::Error;

use crate::models::DayOfWeek;

pub const MINUTES_PER_DAY: u16 = 24 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimeParseError {
    #[error("invalid time '{0}', expected HH:mm")]
    InvalidTime(String),

    #[error("invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),
}

/// Parse `HH:mm` (or Postgres' `HH:mm:ss`, seconds ignored) into minutes since midnight.
pub fn parse_hhmm(value: &str) -> Result<u16, TimeParseError> {
    let invalid = || TimeParseError::InvalidTime(value.to_string());

    let mut parts = value.trim().split(':');
    let hours = parts.next().ok_or_else(invalid)?;
    let minutes = parts.next().ok_or_else(invalid)?;
    if let Some(seconds) = parts.next() {
        if seconds.len() != 2 || !seconds.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
    }
    if parts.next().is_some() || hours.len() != 2 || minutes.len() != 2 {
        return Err(invalid());
    }

    let hours: u16 = hours.parse().map_err(|_| invalid())?;
    let minutes: u16 = minutes.parse().map_err(|_| invalid())?;
    if hours > 23 || minutes > 59 {
        return Err(invalid());
    }

    Ok(hours * 60 + minutes)
}

/// Render minutes since midnight as zero-padded `HH:mm`.
pub fn format_hhmm(minutes: u16) -> String {
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

pub fn parse_date(value: &str) -> Result<NaiveDate, TimeParseError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| TimeParseError::InvalidDate(value.to_string()))
}

pub fn day_of_week(date: NaiveDate) -> DayOfWeek {
    DayOfWeek::from(date.weekday())
}

/// Every calendar date in `[from, to]`; empty when `from > to`.
pub fn dates_in_range(from: NaiveDate, to: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    from.iter_days().take_while(move |date| *date <= to)
}

/// Inclusive day count of `[from, to]`.
pub fn days_in_range(from: NaiveDate, to: NaiveDate) -> i64 {
    (to - from).num_days() + 1
}

/// Serde adapter storing minute offsets as `HH:mm` strings.
pub mod hhmm {
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(minutes: &u16, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::format_hhmm(*minutes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<u16, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        super::parse_hhmm(&raw).map_err(D::Error::custom)
    }
}
