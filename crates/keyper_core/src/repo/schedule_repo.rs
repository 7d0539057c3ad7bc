//! Schedule repository contracts and SQLite implementation.
//!
//! # Invariants
//! - Schedules are insert-only; there is no update path.
//! - `find_schedules_by_room` returns rows in insertion order so "first
//!   match" is deterministic.

use super::support::{ensure_connection_ready, get_uuid, query_all, TableShape};
use super::{RepoError, RepoResult};
use crate::model::schedule::{format_time_of_day, parse_time_of_day, Schedule};
use chrono::NaiveTime;
use rusqlite::{params, Connection, Row};

const REQUIRED_TABLES: &[TableShape] = &[(
    "schedules",
    &[
        "seq",
        "uuid",
        "room_name",
        "start_time",
        "end_time",
        "day_of_week",
        "subject",
        "instructor_name",
    ],
)];

const SCHEDULE_SELECT_SQL: &str = "SELECT
    uuid,
    room_name,
    start_time,
    end_time,
    day_of_week,
    subject,
    instructor_name
FROM schedules";

/// Repository interface for schedule storage.
pub trait ScheduleRepository {
    fn insert_schedule(&self, schedule: &Schedule) -> RepoResult<()>;
    /// All schedules bound to `room_name`, oldest first. Queried fresh per call.
    fn find_schedules_by_room(&self, room_name: &str) -> RepoResult<Vec<Schedule>>;
    fn list_schedules(&self) -> RepoResult<Vec<Schedule>>;
}

/// SQLite-backed schedule repository.
pub struct SqliteScheduleRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteScheduleRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, REQUIRED_TABLES)?;
        Ok(Self { conn })
    }
}

impl ScheduleRepository for SqliteScheduleRepository<'_> {
    fn insert_schedule(&self, schedule: &Schedule) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO schedules (
                uuid,
                room_name,
                start_time,
                end_time,
                day_of_week,
                subject,
                instructor_name
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                schedule.id.to_string(),
                schedule.room_name.as_str(),
                format_time_of_day(schedule.start_time),
                format_time_of_day(schedule.end_time),
                schedule.day_of_week.as_str(),
                schedule.subject.as_str(),
                schedule.instructor_name.as_str(),
            ],
        )?;
        Ok(())
    }

    fn find_schedules_by_room(&self, room_name: &str) -> RepoResult<Vec<Schedule>> {
        query_all(
            self.conn,
            &format!("{SCHEDULE_SELECT_SQL} WHERE room_name = ?1 ORDER BY seq ASC;"),
            [room_name],
            parse_schedule_row,
        )
    }

    fn list_schedules(&self) -> RepoResult<Vec<Schedule>> {
        query_all(
            self.conn,
            &format!("{SCHEDULE_SELECT_SQL} ORDER BY seq ASC;"),
            [],
            parse_schedule_row,
        )
    }
}

fn parse_schedule_row(row: &Row<'_>) -> RepoResult<Schedule> {
    Ok(Schedule {
        id: get_uuid(row, "uuid")?,
        room_name: row.get("room_name")?,
        start_time: get_time(row, "start_time")?,
        end_time: get_time(row, "end_time")?,
        day_of_week: row.get("day_of_week")?,
        subject: row.get("subject")?,
        instructor_name: row.get("instructor_name")?,
    })
}

fn get_time(row: &Row<'_>, column: &'static str) -> RepoResult<NaiveTime> {
    let value: String = row.get(column)?;
    parse_time_of_day(&value).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid time `{value}` in schedules.{column}"))
    })
}
