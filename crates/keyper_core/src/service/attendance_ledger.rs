//! Check-in admission against the class schedule.
//!
//! # Responsibility
//! - Resolve student and room for one check-in.
//! - Match the room's active schedule and refuse same-day duplicates.
//!
//! # Invariants
//! - At most one attendance fact exists per `(schedule, student, day)`.
//! - A commit that loses a uniqueness race is reported as
//!   `DuplicateAttendance`, never as a storage fault.
//! - The calendar day is the local date of the admission instant.

use super::admission::{AdmissionError, AdmissionResult, Rejection};
use super::schedule_service::select_active_schedule;
use crate::config::DayScope;
use crate::model::fact::AttendanceFact;
use crate::repo::directory_repo::DirectoryRepository;
use crate::repo::ledger_repo::LedgerRepository;
use crate::repo::schedule_repo::ScheduleRepository;
use crate::repo::RepoError;
use chrono::{Local, NaiveDateTime, Timelike};
use log::{info, warn};

/// Attendance ledger over directory, schedule and ledger repositories.
pub struct AttendanceLedger<D, S, L>
where
    D: DirectoryRepository,
    S: ScheduleRepository,
    L: LedgerRepository,
{
    directory: D,
    schedules: S,
    ledger: L,
    day_scope: DayScope,
}

impl<D, S, L> AttendanceLedger<D, S, L>
where
    D: DirectoryRepository,
    S: ScheduleRepository,
    L: LedgerRepository,
{
    pub fn new(directory: D, schedules: S, ledger: L, day_scope: DayScope) -> Self {
        Self {
            directory,
            schedules,
            ledger,
            day_scope,
        }
    }

    /// Admits a check-in stamped with the local wall clock.
    pub fn check_in_now(&self, rfid: &str, room_name: &str) -> AdmissionResult<AttendanceFact> {
        self.admit_attendance(rfid, room_name, Local::now().naive_local())
    }

    /// Admits a check-in for the card `rfid` in `room_name` at `at`.
    ///
    /// # Errors
    /// - `Rejected(InvalidInput)` for blank card tag or room name.
    /// - `Rejected(UnknownStudent | UnknownRoom)` in that order.
    /// - `Rejected(NoActiveSchedule)` when no window covers `at`.
    /// - `Rejected(DuplicateAttendance)` on a same-day repeat.
    pub fn admit_attendance(
        &self,
        rfid: &str,
        room_name: &str,
        at: NaiveDateTime,
    ) -> AdmissionResult<AttendanceFact> {
        let result = self.try_admit(rfid.trim(), room_name.trim(), at);
        match &result {
            Ok(fact) => info!(
                "event=attendance_admit module=attendance_ledger status=ok attendance_id={} schedule_id={} day={}",
                fact.id, fact.schedule_id, fact.day
            ),
            Err(AdmissionError::Rejected(reason)) => warn!(
                "event=attendance_admit module=attendance_ledger status=rejected room={} reason={}",
                room_name,
                reason.code()
            ),
            Err(AdmissionError::Storage(err)) => warn!(
                "event=attendance_admit module=attendance_ledger status=error room={} error={}",
                room_name, err
            ),
        }
        result
    }

    /// Returns all attendance facts, oldest first.
    pub fn list_attendance(&self) -> Result<Vec<AttendanceFact>, RepoError> {
        self.ledger.list_attendance()
    }

    fn try_admit(
        &self,
        rfid: &str,
        room_name: &str,
        at: NaiveDateTime,
    ) -> AdmissionResult<AttendanceFact> {
        if rfid.is_empty() {
            return Err(Rejection::InvalidInput("rfid").into());
        }
        if room_name.is_empty() {
            return Err(Rejection::InvalidInput("room_name").into());
        }

        let student = self
            .directory
            .resolve_student_by_rfid(rfid)?
            .ok_or(Rejection::UnknownStudent)?;
        let room = self
            .directory
            .resolve_room_by_name(room_name)?
            .ok_or(Rejection::UnknownRoom)?;

        let at = at.with_nanosecond(0).unwrap_or(at);
        let candidates = self.schedules.find_schedules_by_room(&room.name)?;
        let schedule = select_active_schedule(&candidates, at, self.day_scope)
            .ok_or(Rejection::NoActiveSchedule)?;

        if self
            .ledger
            .find_attendance(schedule.id, student.id, at.date())?
            .is_some()
        {
            return Err(Rejection::DuplicateAttendance.into());
        }

        let fact = AttendanceFact::snapshot(&student, schedule, at);
        match self.ledger.commit_attendance(&fact) {
            Ok(()) => Ok(fact),
            Err(err) if err.is_unique_violation_on("attendance") => {
                Err(Rejection::DuplicateAttendance.into())
            }
            Err(err) => Err(err.into()),
        }
    }
}
