//! Borrow/return admission.
//!
//! # Responsibility
//! - Resolve student, room and key for one custody event.
//! - Advance key status and write the custody fact as one unit.
//!
//! # Invariants
//! - Preconditions are checked in order: student, room, key.
//! - Key status only changes together with a committed custody fact.
//! - The commit is a compare-and-set on the status read during admission;
//!   a lost race re-runs admission at most `MAX_COMMIT_ATTEMPTS` times.

use super::admission::{AdmissionError, AdmissionResult, Rejection};
use crate::config::CustodyPolicy;
use crate::model::fact::CustodyFact;
use crate::model::key::{check_transition, RecordType};
use crate::repo::directory_repo::DirectoryRepository;
use crate::repo::ledger_repo::LedgerRepository;
use crate::repo::RepoError;
use chrono::{Local, NaiveDateTime, Timelike};
use log::{info, warn};
use uuid::Uuid;

const MAX_COMMIT_ATTEMPTS: usize = 3;

/// Borrow/return ledger over directory and ledger repositories.
pub struct RecordLedger<D: DirectoryRepository, L: LedgerRepository> {
    directory: D,
    ledger: L,
    policy: CustodyPolicy,
}

impl<D: DirectoryRepository, L: LedgerRepository> RecordLedger<D, L> {
    pub fn new(directory: D, ledger: L, policy: CustodyPolicy) -> Self {
        Self {
            directory,
            ledger,
            policy,
        }
    }

    pub fn policy(&self) -> CustodyPolicy {
        self.policy
    }

    /// Admits one borrow/return event stamped with the local wall clock.
    pub fn admit_record(
        &self,
        kind: RecordType,
        school_id: &str,
        key_rfid: &str,
        room_name: &str,
    ) -> AdmissionResult<CustodyFact> {
        let now = Local::now().naive_local();
        self.admit_record_at(kind, school_id, key_rfid, room_name, now)
    }

    /// Admits one borrow/return event stamped with `at`.
    ///
    /// # Errors
    /// - `Rejected(InvalidInput)` for blank school id or room name.
    /// - `Rejected(UnknownStudent | UnknownRoom | UnknownKey)` in that order.
    /// - `Rejected(AlreadyBorrowed | AlreadyAvailable | KeyOutOfService)`
    ///   under `CustodyPolicy::Strict` only.
    /// - `Storage(StaleKeyStatus)` when every commit attempt lost a race.
    pub fn admit_record_at(
        &self,
        kind: RecordType,
        school_id: &str,
        key_rfid: &str,
        room_name: &str,
        at: NaiveDateTime,
    ) -> AdmissionResult<CustodyFact> {
        let result = self.admit_with_retry(
            kind,
            school_id.trim(),
            key_rfid.trim(),
            room_name.trim(),
            at,
        );
        match &result {
            Ok(fact) => info!(
                "event=record_admit module=record_ledger status=ok record_id={} type={} key_id={}",
                fact.id, fact.kind, fact.key_id
            ),
            Err(AdmissionError::Rejected(reason)) => warn!(
                "event=record_admit module=record_ledger status=rejected type={} key_rfid={} reason={}",
                kind,
                key_rfid,
                reason.code()
            ),
            Err(AdmissionError::Storage(err)) => warn!(
                "event=record_admit module=record_ledger status=error type={} key_rfid={} error={}",
                kind, key_rfid, err
            ),
        }
        result
    }

    /// Returns all custody facts, oldest first.
    pub fn list_records(&self) -> Result<Vec<CustodyFact>, RepoError> {
        self.ledger.list_records()
    }

    /// Returns the custody facts of the key tagged `key_rfid`, oldest first.
    ///
    /// # Errors
    /// - `Rejected(UnknownKey)` when no key carries the tag.
    pub fn key_history(&self, key_rfid: &str) -> AdmissionResult<Vec<CustodyFact>> {
        let key = self
            .directory
            .resolve_key_by_rfid(key_rfid.trim())?
            .ok_or(Rejection::UnknownKey)?;
        Ok(self.ledger.list_records_for_key(key.id)?)
    }

    fn admit_with_retry(
        &self,
        kind: RecordType,
        school_id: &str,
        key_rfid: &str,
        room_name: &str,
        at: NaiveDateTime,
    ) -> AdmissionResult<CustodyFact> {
        if school_id.is_empty() {
            return Err(Rejection::InvalidInput("school_id").into());
        }
        if room_name.is_empty() {
            return Err(Rejection::InvalidInput("room_name").into());
        }

        let recorded_at = at.with_nanosecond(0).unwrap_or(at);
        let mut attempt = 1;
        loop {
            match self.try_admit(kind, school_id, key_rfid, room_name, recorded_at) {
                Err(AdmissionError::Storage(RepoError::StaleKeyStatus(key_id)))
                    if attempt < MAX_COMMIT_ATTEMPTS =>
                {
                    warn!(
                        "event=record_commit module=record_ledger status=retry key_id={} attempt={}",
                        key_id, attempt
                    );
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    fn try_admit(
        &self,
        kind: RecordType,
        school_id: &str,
        key_rfid: &str,
        room_name: &str,
        recorded_at: NaiveDateTime,
    ) -> AdmissionResult<CustodyFact> {
        let student = self
            .directory
            .resolve_student_by_school_id(school_id)?
            .ok_or(Rejection::UnknownStudent)?;
        let room = self
            .directory
            .resolve_room_by_name(room_name)?
            .ok_or(Rejection::UnknownRoom)?;
        let key = self
            .directory
            .resolve_key_by_rfid(key_rfid)?
            .ok_or(Rejection::UnknownKey)?;
        let building = self
            .directory
            .resolve_building_by_id(room.building_id)?
            .ok_or(Rejection::UnknownBuilding)?;

        if self.policy == CustodyPolicy::Strict {
            check_transition(key.status, kind).map_err(Rejection::from)?;
        }
        let next = key.status.apply(kind);

        let fact = CustodyFact {
            id: Uuid::new_v4(),
            kind,
            student_id: student.id,
            key_id: key.id,
            room_id: room.id,
            student_name: student.display_name(),
            room_name: room.name,
            building_name: building.name,
            recorded_at,
        };
        self.ledger.commit_record(&fact, key.status, next)?;
        Ok(fact)
    }
}
