//! Class schedule model and time-of-day format rules.
//!
//! # Responsibility
//! - Define the schedule window a room is bound to.
//! - Own the strict `HH:MM:SS` 24-hour format check.
//!
//! # Invariants
//! - `start_time <= end_time`; windows never wrap past midnight.
//! - Window bounds are inclusive on both ends.
//! - Schedules are immutable once stored.

use chrono::{NaiveTime, Weekday};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type ScheduleId = Uuid;

pub const TIME_OF_DAY_FORMAT: &str = "%H:%M:%S";

static TIME_OF_DAY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([01]\d|2[0-3]):([0-5]\d):([0-5]\d)$").expect("valid time-of-day regex")
});

/// Returns whether `value` is exactly `HH:MM:SS` on a 24-hour clock.
pub fn is_valid_time_format(value: &str) -> bool {
    TIME_OF_DAY_RE.is_match(value)
}

/// Parses a validated `HH:MM:SS` string. Any other shape yields `None`.
pub fn parse_time_of_day(value: &str) -> Option<NaiveTime> {
    if !is_valid_time_format(value) {
        return None;
    }
    NaiveTime::parse_from_str(value, TIME_OF_DAY_FORMAT).ok()
}

pub fn format_time_of_day(value: NaiveTime) -> String {
    value.format(TIME_OF_DAY_FORMAT).to_string()
}

/// Binding of a room to a subject and instructor over a daily time window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub id: ScheduleId,
    /// Room reference by natural key.
    pub room_name: String,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    /// Free-form day label as entered, e.g. `Monday` or `MWF`.
    pub day_of_week: String,
    pub subject: String,
    pub instructor_name: String,
}

impl Schedule {
    /// Returns whether `time` lies within `[start_time, end_time]`.
    pub fn covers(&self, time: NaiveTime) -> bool {
        self.start_time <= time && time <= self.end_time
    }

    /// Weekday named by `day_of_week`, when the label is a plain weekday name.
    pub fn weekday(&self) -> Option<Weekday> {
        self.day_of_week.trim().parse::<Weekday>().ok()
    }
}
