//! Immutable ledger facts.
//!
//! # Responsibility
//! - Define the custody record written per borrow/return event.
//! - Define the attendance record written per admitted check-in.
//!
//! # Invariants
//! - Facts are never updated or deleted once committed.
//! - Descriptive fields are copied from directory/schedule rows at admission
//!   and are never re-joined; later edits do not rewrite history.
//! - At most one attendance fact exists per `(schedule_id, student_id, day)`.

use super::directory::{RoomId, Student, StudentId};
use super::key::{KeyId, RecordType};
use super::schedule::{Schedule, ScheduleId};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type FactId = Uuid;

/// Storage format for fact timestamps (local wall clock).
pub const FACT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
/// Storage format for attendance calendar days.
pub const FACT_DAY_FORMAT: &str = "%Y-%m-%d";

/// One borrow or return event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustodyFact {
    pub id: FactId,
    #[serde(rename = "type")]
    pub kind: RecordType,
    pub student_id: StudentId,
    pub key_id: KeyId,
    pub room_id: RoomId,
    pub student_name: String,
    pub room_name: String,
    pub building_name: String,
    pub recorded_at: NaiveDateTime,
}

/// One admitted check-in against a matched schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceFact {
    pub id: FactId,
    pub schedule_id: ScheduleId,
    pub student_id: StudentId,
    pub student_name: String,
    pub section: String,
    pub course: String,
    pub room_name: String,
    pub subject: String,
    /// Local calendar day of `recorded_at`; part of the uniqueness key.
    pub day: NaiveDate,
    pub recorded_at: NaiveDateTime,
}

impl AttendanceFact {
    /// Builds a fact by snapshotting the student and matched schedule.
    pub fn snapshot(student: &Student, schedule: &Schedule, at: NaiveDateTime) -> Self {
        Self {
            id: Uuid::new_v4(),
            schedule_id: schedule.id,
            student_id: student.id,
            student_name: student.display_name(),
            section: student.section.clone(),
            course: student.course.clone(),
            room_name: schedule.room_name.clone(),
            subject: schedule.subject.clone(),
            day: at.date(),
            recorded_at: at,
        }
    }
}
