//! Ledger repository: fact lookups and atomic commits.
//!
//! # Responsibility
//! - Answer the duplicate-attendance lookup for the attendance ledger.
//! - Commit custody facts together with the key status they imply.
//!
//! # Invariants
//! - `commit_record` updates `keys.status` and inserts the custody fact in one
//!   `IMMEDIATE` transaction; either both land or neither does.
//! - The status update is a compare-and-set on the status read during
//!   admission; a mismatch aborts with `StaleKeyStatus`.
//! - Attendance uniqueness on `(schedule, student, day)` is enforced by a
//!   UNIQUE index, so concurrent admissions cannot both commit.

use super::support::{ensure_connection_ready, get_uuid, query_all, query_optional, TableShape};
use super::{RepoError, RepoResult};
use crate::model::directory::StudentId;
use crate::model::fact::{AttendanceFact, CustodyFact, FACT_DAY_FORMAT, FACT_TIMESTAMP_FORMAT};
use crate::model::key::{KeyId, KeyStatus, RecordType};
use crate::model::schedule::ScheduleId;
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection, Row, Transaction, TransactionBehavior};

const REQUIRED_TABLES: &[TableShape] = &[
    (
        "custody_records",
        &[
            "seq",
            "uuid",
            "type",
            "student_uuid",
            "key_uuid",
            "room_uuid",
            "student_name",
            "room_name",
            "building_name",
            "recorded_at",
        ],
    ),
    (
        "attendance",
        &[
            "seq",
            "uuid",
            "schedule_uuid",
            "student_uuid",
            "student_name",
            "section",
            "course",
            "room_name",
            "subject",
            "attendance_day",
            "recorded_at",
        ],
    ),
    ("keys", &["uuid", "status"]),
];

const RECORD_SELECT_SQL: &str = "SELECT
    uuid,
    type,
    student_uuid,
    key_uuid,
    room_uuid,
    student_name,
    room_name,
    building_name,
    recorded_at
FROM custody_records";

const ATTENDANCE_SELECT_SQL: &str = "SELECT
    uuid,
    schedule_uuid,
    student_uuid,
    student_name,
    section,
    course,
    room_name,
    subject,
    attendance_day,
    recorded_at
FROM attendance";

/// Repository interface for ledger facts.
pub trait LedgerRepository {
    /// Existing check-in for one student, schedule and calendar day.
    fn find_attendance(
        &self,
        schedule_id: ScheduleId,
        student_id: StudentId,
        day: NaiveDate,
    ) -> RepoResult<Option<AttendanceFact>>;
    /// Persists one attendance fact. Duplicates fail with `UniqueViolation`.
    fn commit_attendance(&self, fact: &AttendanceFact) -> RepoResult<()>;
    /// Persists one custody fact and moves the key from `expected` to `next`.
    fn commit_record(
        &self,
        fact: &CustodyFact,
        expected: KeyStatus,
        next: KeyStatus,
    ) -> RepoResult<()>;
    fn list_attendance(&self) -> RepoResult<Vec<AttendanceFact>>;
    fn list_records(&self) -> RepoResult<Vec<CustodyFact>>;
    fn list_records_for_key(&self, key_id: KeyId) -> RepoResult<Vec<CustodyFact>>;
}

/// SQLite-backed ledger repository.
pub struct SqliteLedgerRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteLedgerRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, REQUIRED_TABLES)?;
        Ok(Self { conn })
    }
}

impl LedgerRepository for SqliteLedgerRepository<'_> {
    fn find_attendance(
        &self,
        schedule_id: ScheduleId,
        student_id: StudentId,
        day: NaiveDate,
    ) -> RepoResult<Option<AttendanceFact>> {
        query_optional(
            self.conn,
            &format!(
                "{ATTENDANCE_SELECT_SQL}
                 WHERE schedule_uuid = ?1
                   AND student_uuid = ?2
                   AND attendance_day = ?3;"
            ),
            params![
                schedule_id.to_string(),
                student_id.to_string(),
                day.format(FACT_DAY_FORMAT).to_string(),
            ],
            parse_attendance_row,
        )
    }

    fn commit_attendance(&self, fact: &AttendanceFact) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO attendance (
                uuid,
                schedule_uuid,
                student_uuid,
                student_name,
                section,
                course,
                room_name,
                subject,
                attendance_day,
                recorded_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10);",
            params![
                fact.id.to_string(),
                fact.schedule_id.to_string(),
                fact.student_id.to_string(),
                fact.student_name.as_str(),
                fact.section.as_str(),
                fact.course.as_str(),
                fact.room_name.as_str(),
                fact.subject.as_str(),
                fact.day.format(FACT_DAY_FORMAT).to_string(),
                fact.recorded_at.format(FACT_TIMESTAMP_FORMAT).to_string(),
            ],
        )?;
        Ok(())
    }

    fn commit_record(
        &self,
        fact: &CustodyFact,
        expected: KeyStatus,
        next: KeyStatus,
    ) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;

        let changed = tx.execute(
            "UPDATE keys
             SET status = ?3,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1
               AND status = ?2;",
            params![fact.key_id.to_string(), expected.as_str(), next.as_str()],
        )?;
        if changed == 0 {
            let exists: i64 = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM keys WHERE uuid = ?1);",
                [fact.key_id.to_string()],
                |row| row.get(0),
            )?;
            if exists == 0 {
                return Err(RepoError::NotFound {
                    entity: "key",
                    key: fact.key_id.to_string(),
                });
            }
            return Err(RepoError::StaleKeyStatus(fact.key_id));
        }

        tx.execute(
            "INSERT INTO custody_records (
                uuid,
                type,
                student_uuid,
                key_uuid,
                room_uuid,
                student_name,
                room_name,
                building_name,
                recorded_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
            params![
                fact.id.to_string(),
                fact.kind.as_str(),
                fact.student_id.to_string(),
                fact.key_id.to_string(),
                fact.room_id.to_string(),
                fact.student_name.as_str(),
                fact.room_name.as_str(),
                fact.building_name.as_str(),
                fact.recorded_at.format(FACT_TIMESTAMP_FORMAT).to_string(),
            ],
        )?;

        tx.commit()?;
        Ok(())
    }

    fn list_attendance(&self) -> RepoResult<Vec<AttendanceFact>> {
        query_all(
            self.conn,
            &format!("{ATTENDANCE_SELECT_SQL} ORDER BY seq ASC;"),
            [],
            parse_attendance_row,
        )
    }

    fn list_records(&self) -> RepoResult<Vec<CustodyFact>> {
        query_all(
            self.conn,
            &format!("{RECORD_SELECT_SQL} ORDER BY seq ASC;"),
            [],
            parse_record_row,
        )
    }

    fn list_records_for_key(&self, key_id: KeyId) -> RepoResult<Vec<CustodyFact>> {
        query_all(
            self.conn,
            &format!("{RECORD_SELECT_SQL} WHERE key_uuid = ?1 ORDER BY seq ASC;"),
            [key_id.to_string()],
            parse_record_row,
        )
    }
}

fn parse_record_row(row: &Row<'_>) -> RepoResult<CustodyFact> {
    let type_text: String = row.get("type")?;
    let kind = type_text.parse::<RecordType>().map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid record type `{type_text}` in custody_records.type"
        ))
    })?;

    Ok(CustodyFact {
        id: get_uuid(row, "uuid")?,
        kind,
        student_id: get_uuid(row, "student_uuid")?,
        key_id: get_uuid(row, "key_uuid")?,
        room_id: get_uuid(row, "room_uuid")?,
        student_name: row.get("student_name")?,
        room_name: row.get("room_name")?,
        building_name: row.get("building_name")?,
        recorded_at: get_timestamp(row, "recorded_at")?,
    })
}

fn parse_attendance_row(row: &Row<'_>) -> RepoResult<AttendanceFact> {
    let day_text: String = row.get("attendance_day")?;
    let day = NaiveDate::parse_from_str(&day_text, FACT_DAY_FORMAT).map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid day `{day_text}` in attendance.attendance_day"
        ))
    })?;

    Ok(AttendanceFact {
        id: get_uuid(row, "uuid")?,
        schedule_id: get_uuid(row, "schedule_uuid")?,
        student_id: get_uuid(row, "student_uuid")?,
        student_name: row.get("student_name")?,
        section: row.get("section")?,
        course: row.get("course")?,
        room_name: row.get("room_name")?,
        subject: row.get("subject")?,
        day,
        recorded_at: get_timestamp(row, "recorded_at")?,
    })
}

fn get_timestamp(row: &Row<'_>, column: &'static str) -> RepoResult<NaiveDateTime> {
    let value: String = row.get(column)?;
    NaiveDateTime::parse_from_str(&value, FACT_TIMESTAMP_FORMAT)
        .map_err(|_| RepoError::InvalidData(format!("invalid timestamp `{value}` in {column}")))
}
