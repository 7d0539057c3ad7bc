//! Schedule catalog and schedule matching.
//!
//! # Responsibility
//! - Validate and store new schedules.
//! - Find the schedule window that covers a room at a given instant.
//!
//! # Invariants
//! - Stored schedules always carry valid `HH:MM:SS` bounds with
//!   `start_time <= end_time`.
//! - Matching reads schedules fresh on every call and returns the first
//!   covering row in insertion order.

use crate::config::DayScope;
use crate::model::schedule::{parse_time_of_day, Schedule};
use crate::repo::directory_repo::DirectoryRepository;
use crate::repo::schedule_repo::ScheduleRepository;
use crate::repo::RepoError;
use chrono::{Datelike, NaiveDateTime, Timelike};
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Input for creating one schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateScheduleRequest {
    pub room_name: String,
    /// `HH:MM:SS`, 24-hour.
    pub start_time: String,
    /// `HH:MM:SS`, 24-hour.
    pub end_time: String,
    pub day_of_week: String,
    pub subject: String,
    pub instructor_name: String,
}

/// Errors from schedule catalog operations.
#[derive(Debug)]
pub enum ScheduleServiceError {
    /// A bound is not exact `HH:MM:SS`.
    InvalidTimeFormat { field: &'static str, value: String },
    /// `start_time` is after `end_time`.
    InvalidTimeWindow { start: String, end: String },
    /// Required field is blank after trim.
    InvalidInput(&'static str),
    /// Room name does not resolve.
    UnknownRoom(String),
    Repo(RepoError),
}

impl Display for ScheduleServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidTimeFormat { field, value } => {
                write!(f, "{field} `{value}` is not in HH:MM:SS format")
            }
            Self::InvalidTimeWindow { start, end } => {
                write!(f, "start time {start} is after end time {end}")
            }
            Self::InvalidInput(field) => write!(f, "{field} must not be blank"),
            Self::UnknownRoom(name) => write!(f, "room not found: {name}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ScheduleServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ScheduleServiceError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Picks the first schedule whose window covers `at`.
///
/// `at` is compared at whole-second precision and bounds are inclusive, so
/// any instant inside the end second still matches. Under `DayScope::Enforce` the schedule's day label
/// must also name `at`'s weekday; labels that are not weekday names never
/// match.
pub fn select_active_schedule(
    schedules: &[Schedule],
    at: NaiveDateTime,
    day_scope: DayScope,
) -> Option<&Schedule> {
    let time = at.time().with_nanosecond(0).unwrap_or_else(|| at.time());
    let weekday = at.weekday();
    schedules.iter().find(|schedule| {
        schedule.covers(time)
            && match day_scope {
                DayScope::Ignore => true,
                DayScope::Enforce => schedule.weekday() == Some(weekday),
            }
    })
}

/// Schedule catalog and matcher over schedule and directory repositories.
pub struct ScheduleService<S: ScheduleRepository, D: DirectoryRepository> {
    schedules: S,
    directory: D,
    day_scope: DayScope,
}

impl<S: ScheduleRepository, D: DirectoryRepository> ScheduleService<S, D> {
    pub fn new(schedules: S, directory: D, day_scope: DayScope) -> Self {
        Self {
            schedules,
            directory,
            day_scope,
        }
    }

    /// Validates and stores one schedule.
    ///
    /// # Errors
    /// - `InvalidInput` for blank room name or subject.
    /// - `InvalidTimeFormat` / `InvalidTimeWindow` for bad bounds.
    /// - `UnknownRoom` when the room is not in the directory.
    pub fn create_schedule(
        &self,
        request: &CreateScheduleRequest,
    ) -> Result<Schedule, ScheduleServiceError> {
        let room_name = request.room_name.trim();
        if room_name.is_empty() {
            return Err(ScheduleServiceError::InvalidInput("room_name"));
        }
        let subject = request.subject.trim();
        if subject.is_empty() {
            return Err(ScheduleServiceError::InvalidInput("subject"));
        }

        let start_time = parse_time_of_day(&request.start_time).ok_or_else(|| {
            ScheduleServiceError::InvalidTimeFormat {
                field: "start_time",
                value: request.start_time.clone(),
            }
        })?;
        let end_time = parse_time_of_day(&request.end_time).ok_or_else(|| {
            ScheduleServiceError::InvalidTimeFormat {
                field: "end_time",
                value: request.end_time.clone(),
            }
        })?;
        if start_time > end_time {
            return Err(ScheduleServiceError::InvalidTimeWindow {
                start: request.start_time.clone(),
                end: request.end_time.clone(),
            });
        }

        if self.directory.resolve_room_by_name(room_name)?.is_none() {
            warn!(
                "event=schedule_create module=schedule status=rejected reason=unknown_room room={}",
                room_name
            );
            return Err(ScheduleServiceError::UnknownRoom(room_name.to_string()));
        }

        let schedule = Schedule {
            id: Uuid::new_v4(),
            room_name: room_name.to_string(),
            start_time,
            end_time,
            day_of_week: request.day_of_week.trim().to_string(),
            subject: subject.to_string(),
            instructor_name: request.instructor_name.trim().to_string(),
        };
        self.schedules.insert_schedule(&schedule)?;

        info!(
            "event=schedule_create module=schedule status=ok schedule_id={} room={}",
            schedule.id, schedule.room_name
        );
        Ok(schedule)
    }

    /// Returns all schedules in insertion order.
    pub fn list_schedules(&self) -> Result<Vec<Schedule>, ScheduleServiceError> {
        Ok(self.schedules.list_schedules()?)
    }

    /// Finds the schedule active in `room_name` at `at`.
    ///
    /// `Ok(None)` is a normal outcome when no window covers the instant.
    pub fn match_schedule(
        &self,
        room_name: &str,
        at: NaiveDateTime,
    ) -> Result<Option<Schedule>, RepoError> {
        let candidates = self.schedules.find_schedules_by_room(room_name)?;
        Ok(select_active_schedule(&candidates, at, self.day_scope).cloned())
    }
}
