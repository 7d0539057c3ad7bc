//! Admission outcomes shared by both ledgers.
//!
//! # Responsibility
//! - Name every reason a borrow/return or check-in event can be refused.
//! - Separate business rejections from storage faults.
//!
//! # Invariants
//! - Rejections are final for the given input; only `Storage` is retryable.

use crate::model::key::{KeyStatus, TransitionConflict};
use crate::repo::RepoError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type AdmissionResult<T> = Result<T, AdmissionError>;

/// Reason an event was not admitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    UnknownStudent,
    UnknownRoom,
    UnknownKey,
    UnknownBuilding,
    /// No schedule window in the room covers the instant.
    NoActiveSchedule,
    /// Student already checked into this schedule on this day.
    DuplicateAttendance,
    AlreadyBorrowed,
    AlreadyAvailable,
    /// Borrow of a key that is lost or unavailable.
    KeyOutOfService(KeyStatus),
    /// Required input field is blank.
    InvalidInput(&'static str),
}

impl Rejection {
    /// Stable snake_case code for logs.
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownStudent => "unknown_student",
            Self::UnknownRoom => "unknown_room",
            Self::UnknownKey => "unknown_key",
            Self::UnknownBuilding => "unknown_building",
            Self::NoActiveSchedule => "no_active_schedule",
            Self::DuplicateAttendance => "duplicate_attendance",
            Self::AlreadyBorrowed => "already_borrowed",
            Self::AlreadyAvailable => "already_available",
            Self::KeyOutOfService(_) => "key_out_of_service",
            Self::InvalidInput(_) => "invalid_input",
        }
    }
}

impl Display for Rejection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownStudent => write!(f, "student not found"),
            Self::UnknownRoom => write!(f, "room not found"),
            Self::UnknownKey => write!(f, "key not found"),
            Self::UnknownBuilding => write!(f, "building not found"),
            Self::NoActiveSchedule => write!(f, "no schedule found for this room at this time"),
            Self::DuplicateAttendance => {
                write!(f, "attendance already recorded for this schedule today")
            }
            Self::AlreadyBorrowed => write!(f, "key is already borrowed"),
            Self::AlreadyAvailable => write!(f, "key is already available"),
            Self::KeyOutOfService(status) => write!(f, "key is {status} and cannot be borrowed"),
            Self::InvalidInput(field) => write!(f, "{field} must not be blank"),
        }
    }
}

impl From<TransitionConflict> for Rejection {
    fn from(value: TransitionConflict) -> Self {
        match value {
            TransitionConflict::AlreadyBorrowed => Self::AlreadyBorrowed,
            TransitionConflict::AlreadyAvailable => Self::AlreadyAvailable,
            TransitionConflict::OutOfService(status) => Self::KeyOutOfService(status),
        }
    }
}

/// Error returned by ledger admission.
#[derive(Debug)]
pub enum AdmissionError {
    Rejected(Rejection),
    /// Lookup or commit failed in the store.
    Storage(RepoError),
}

impl AdmissionError {
    /// Storage faults may succeed on a later attempt; rejections never do.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(_))
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Self::Rejected(reason) => Some(reason),
            Self::Storage(_) => None,
        }
    }
}

impl Display for AdmissionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rejected(reason) => write!(f, "rejected: {reason}"),
            Self::Storage(err) => write!(f, "storage error: {err}"),
        }
    }
}

impl Error for AdmissionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Storage(err) => Some(err),
            Self::Rejected(_) => None,
        }
    }
}

impl From<Rejection> for AdmissionError {
    fn from(value: Rejection) -> Self {
        Self::Rejected(value)
    }
}

impl From<RepoError> for AdmissionError {
    fn from(value: RepoError) -> Self {
        Self::Storage(value)
    }
}
