//! Directory entities resolved by the ledgers.
//!
//! # Responsibility
//! - Define buildings, rooms, students and instructors.
//! - Provide constructors that assign fresh stable identities.
//!
//! # Invariants
//! - Natural keys (`name`, `school_id`, `rfid`) are unique per entity kind;
//!   uniqueness is enforced by storage and reported as a conflict.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type BuildingId = Uuid;
pub type RoomId = Uuid;
pub type StudentId = Uuid;
pub type InstructorId = Uuid;

/// Campus building that owns rooms and keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Building {
    pub id: BuildingId,
    pub name: String,
    /// Short label, e.g. `ENG` for an engineering hall.
    pub abbrv: String,
}

impl Building {
    pub fn new(name: impl Into<String>, abbrv: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            abbrv: abbrv.into(),
        }
    }
}

/// Room inside a building. Rooms are addressed by unique name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    pub floor: i64,
    pub building_id: BuildingId,
}

impl Room {
    pub fn new(name: impl Into<String>, floor: i64, building_id: BuildingId) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            floor,
            building_id,
        }
    }
}

/// Student who borrows keys and checks into rooms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub id: StudentId,
    pub first_name: String,
    pub last_name: String,
    pub school_id: String,
    /// Card tag presented at readers.
    pub rfid: String,
    pub college: String,
    pub course: String,
    pub section: String,
}

impl Student {
    /// Name as printed on ledger facts: `Last, First`.
    pub fn display_name(&self) -> String {
        format!("{}, {}", self.last_name, self.first_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instructor {
    pub id: InstructorId,
    pub first_name: String,
    pub last_name: String,
    pub school_id: String,
}
