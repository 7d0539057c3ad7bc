//! Physical key model and custody state machine.
//!
//! # Responsibility
//! - Define the custody `KeyStatus` and the borrow/return `RecordType`.
//! - Provide the pure transition function applied by the record ledger.
//!
//! # Invariants
//! - `apply(_, Return)` is always `Available`; `apply(_, Borrow)` is always
//!   `Borrowed`. The function is total and never rejects.
//! - `Lost`/`Unavailable` are only left through a return event or an admin
//!   status correction; no borrow path restores them to `Available`.
//! - Rejecting redundant transitions is a separate, opt-in check
//!   (`check_transition`), not part of `apply`.

use super::directory::{BuildingId, RoomId};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use uuid::Uuid;

pub type KeyId = Uuid;

/// Custody status of one physical key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyStatus {
    /// On the hook; may be borrowed.
    Available,
    /// Out with a student.
    Borrowed,
    /// Reported missing.
    Lost,
    /// Withdrawn from circulation.
    Unavailable,
}

/// Custody event kind carried by a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordType {
    Borrow,
    Return,
}

/// Raised when a status or event string does not name a known variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseKeyEnumError {
    InvalidKeyStatus(String),
    InvalidRecordType(String),
}

impl Display for ParseKeyEnumError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidKeyStatus(value) => write!(
                f,
                "invalid key status `{value}`; expected available|borrowed|lost|unavailable"
            ),
            Self::InvalidRecordType(value) => {
                write!(f, "invalid record type `{value}`; expected borrow|return")
            }
        }
    }
}

impl Error for ParseKeyEnumError {}

/// Reason a strict custody check refuses a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionConflict {
    /// Borrow requested while the key is already out.
    AlreadyBorrowed,
    /// Return requested while the key is already on the hook.
    AlreadyAvailable,
    /// Borrow requested for a lost or unavailable key.
    OutOfService(KeyStatus),
}

impl KeyStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Borrowed => "borrowed",
            Self::Lost => "lost",
            Self::Unavailable => "unavailable",
        }
    }

    /// Advances custody status for one recorded event.
    pub fn apply(self, event: RecordType) -> KeyStatus {
        match event {
            RecordType::Return => KeyStatus::Available,
            RecordType::Borrow => KeyStatus::Borrowed,
        }
    }
}

impl Display for KeyStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeyStatus {
    type Err = ParseKeyEnumError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "available" => Ok(Self::Available),
            "borrowed" => Ok(Self::Borrowed),
            "lost" => Ok(Self::Lost),
            "unavailable" => Ok(Self::Unavailable),
            other => Err(ParseKeyEnumError::InvalidKeyStatus(other.to_string())),
        }
    }
}

impl RecordType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Borrow => "borrow",
            Self::Return => "return",
        }
    }
}

impl Display for RecordType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordType {
    type Err = ParseKeyEnumError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "borrow" => Ok(Self::Borrow),
            "return" => Ok(Self::Return),
            other => Err(ParseKeyEnumError::InvalidRecordType(other.to_string())),
        }
    }
}

/// Free-function form of [`KeyStatus::apply`].
pub fn apply_transition(current: KeyStatus, event: RecordType) -> KeyStatus {
    current.apply(event)
}

/// Strict custody check layered on top of `apply`.
///
/// Returns `Ok(())` when the event moves the key out of its current state in
/// the expected direction. A return of a lost or unavailable key is accepted:
/// it is how a recovered key re-enters circulation.
pub fn check_transition(current: KeyStatus, event: RecordType) -> Result<(), TransitionConflict> {
    match (event, current) {
        (RecordType::Borrow, KeyStatus::Available) => Ok(()),
        (RecordType::Borrow, KeyStatus::Borrowed) => Err(TransitionConflict::AlreadyBorrowed),
        (RecordType::Borrow, status @ (KeyStatus::Lost | KeyStatus::Unavailable)) => {
            Err(TransitionConflict::OutOfService(status))
        }
        (RecordType::Return, KeyStatus::Available) => Err(TransitionConflict::AlreadyAvailable),
        (RecordType::Return, KeyStatus::Borrowed | KeyStatus::Lost | KeyStatus::Unavailable) => {
            Ok(())
        }
    }
}

/// Physical key bound to exactly one room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Key {
    pub id: KeyId,
    /// Hardware tag; unique across all keys.
    pub rfid: String,
    pub status: KeyStatus,
    pub room_id: RoomId,
    pub building_id: BuildingId,
}

impl Key {
    /// Creates a key in the initial `Available` state.
    pub fn new(rfid: impl Into<String>, room_id: RoomId, building_id: BuildingId) -> Self {
        Self {
            id: Uuid::new_v4(),
            rfid: rfid.into(),
            status: KeyStatus::Available,
            room_id,
            building_id,
        }
    }
}
