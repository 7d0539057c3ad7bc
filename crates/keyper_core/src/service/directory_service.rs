//! Directory administration service.
//!
//! # Responsibility
//! - Create, read, update and delete buildings, rooms, students, instructors
//!   and keys by their natural keys.
//! - Translate storage constraint failures into named conflicts.
//!
//! # Invariants
//! - Names, school ids and card/key tags are trimmed and never blank.
//! - Uniqueness is enforced by storage; a failed insert or update surfaces
//!   the matching `Conflict` variant.
//! - Rows referenced by other rows or by ledger facts are never deleted.

use super::admission::Rejection;
use crate::model::directory::{Building, Instructor, Room, Student};
use crate::model::key::{Key, KeyStatus};
use crate::repo::directory_repo::DirectoryRepository;
use crate::repo::RepoError;
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type DirectoryResult<T> = Result<T, DirectoryError>;

/// Building fields for create and update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildingInput {
    pub name: String,
    pub abbrv: String,
}

/// Room fields for create and update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomInput {
    pub name: String,
    pub floor: i64,
    pub building_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewStudent {
    pub first_name: String,
    pub last_name: String,
    pub school_id: String,
    pub rfid: String,
    pub college: String,
    pub course: String,
    pub section: String,
}

/// Editable student fields. School id and card tag are fixed at creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentUpdate {
    pub first_name: String,
    pub last_name: String,
    pub college: String,
    pub course: String,
    pub section: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewInstructor {
    pub first_name: String,
    pub last_name: String,
    pub school_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstructorUpdate {
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewKey {
    pub rfid: String,
    pub building_name: String,
    pub room_name: String,
}

/// Admin correction of a key's placement and status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyUpdate {
    pub building_name: String,
    pub room_name: String,
    pub status: KeyStatus,
}

/// Named uniqueness or reference conflict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Conflict {
    DuplicateBuildingName,
    DuplicateRoomName,
    DuplicateStudentSchoolId,
    DuplicateStudentRfid,
    DuplicateInstructorSchoolId,
    /// The room already has a key bound to it.
    RoomAlreadyKeyed,
    DuplicateKeyTag,
    /// Delete refused because other rows or ledger facts reference the target.
    StillReferenced(&'static str),
}

impl Display for Conflict {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateBuildingName => write!(f, "building with the same name already exists"),
            Self::DuplicateRoomName => write!(f, "room with the same name already exists"),
            Self::DuplicateStudentSchoolId => {
                write!(f, "student with the same school id already exists")
            }
            Self::DuplicateStudentRfid => write!(f, "student with the same rfid already exists"),
            Self::DuplicateInstructorSchoolId => {
                write!(f, "instructor with the same school id already exists")
            }
            Self::RoomAlreadyKeyed => write!(f, "room already has a key"),
            Self::DuplicateKeyTag => write!(f, "key with the same rfid already exists"),
            Self::StillReferenced(entity) => write!(f, "{entity} is still referenced"),
        }
    }
}

/// Errors from directory operations.
#[derive(Debug)]
pub enum DirectoryError {
    /// Required field is blank after trim.
    InvalidInput(&'static str),
    Conflict(Conflict),
    NotFound { entity: &'static str, key: String },
    /// A referenced building or room does not resolve.
    Rejected(Rejection),
    Repo(RepoError),
}

impl Display for DirectoryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidInput(field) => write!(f, "{field} must not be blank"),
            Self::Conflict(conflict) => write!(f, "conflict: {conflict}"),
            Self::NotFound { entity, key } => write!(f, "{entity} not found: {key}"),
            Self::Rejected(reason) => write!(f, "{reason}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for DirectoryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for DirectoryError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound { entity, key } => Self::NotFound { entity, key },
            other => Self::Repo(other),
        }
    }
}

impl From<Conflict> for DirectoryError {
    fn from(value: Conflict) -> Self {
        Self::Conflict(value)
    }
}

impl From<Rejection> for DirectoryError {
    fn from(value: Rejection) -> Self {
        Self::Rejected(value)
    }
}

/// Unique columns per table and the conflict each one raises.
const BUILDING_UNIQUES: &[(&str, &str, Conflict)] =
    &[("buildings", "name", Conflict::DuplicateBuildingName)];
const ROOM_UNIQUES: &[(&str, &str, Conflict)] = &[("rooms", "name", Conflict::DuplicateRoomName)];
const STUDENT_UNIQUES: &[(&str, &str, Conflict)] = &[
    ("students", "school_id", Conflict::DuplicateStudentSchoolId),
    ("students", "rfid", Conflict::DuplicateStudentRfid),
];
const INSTRUCTOR_UNIQUES: &[(&str, &str, Conflict)] = &[(
    "instructors",
    "school_id",
    Conflict::DuplicateInstructorSchoolId,
)];
const KEY_UNIQUES: &[(&str, &str, Conflict)] = &[
    ("keys", "rfid", Conflict::DuplicateKeyTag),
    ("keys", "room_uuid", Conflict::RoomAlreadyKeyed),
];

/// Directory administration facade.
pub struct DirectoryService<D: DirectoryRepository> {
    repo: D,
}

impl<D: DirectoryRepository> DirectoryService<D> {
    pub fn new(repo: D) -> Self {
        Self { repo }
    }

    pub fn create_building(&self, input: &BuildingInput) -> DirectoryResult<Building> {
        let name = required(&input.name, "name")?;
        let building = Building::new(name, input.abbrv.trim());
        self.repo
            .insert_building(&building)
            .map_err(|err| classify_write(err, BUILDING_UNIQUES, "building"))?;
        log_write("create_building", building.id);
        Ok(building)
    }

    pub fn get_building(&self, name: &str) -> DirectoryResult<Building> {
        self.repo
            .resolve_building_by_name(name.trim())?
            .ok_or_else(|| not_found("building", name))
    }

    pub fn list_buildings(&self) -> DirectoryResult<Vec<Building>> {
        Ok(self.repo.list_buildings()?)
    }

    /// Renames and re-labels the building currently named `name`.
    pub fn update_building(&self, name: &str, input: &BuildingInput) -> DirectoryResult<Building> {
        let mut building = self.get_building(name)?;
        building.name = required(&input.name, "name")?.to_string();
        building.abbrv = input.abbrv.trim().to_string();
        self.repo
            .update_building(&building)
            .map_err(|err| classify_write(err, BUILDING_UNIQUES, "building"))?;
        log_write("update_building", building.id);
        Ok(building)
    }

    pub fn delete_building(&self, name: &str) -> DirectoryResult<()> {
        let building = self.get_building(name)?;
        self.repo
            .delete_building(building.id)
            .map_err(|err| classify_write(err, &[], "building"))?;
        log_write("delete_building", building.id);
        Ok(())
    }

    pub fn create_room(&self, input: &RoomInput) -> DirectoryResult<Room> {
        let name = required(&input.name, "name")?;
        let building = self.resolve_building(&input.building_name)?;
        let room = Room::new(name, input.floor, building.id);
        self.repo
            .insert_room(&room)
            .map_err(|err| classify_write(err, ROOM_UNIQUES, "room"))?;
        log_write("create_room", room.id);
        Ok(room)
    }

    pub fn get_room(&self, name: &str) -> DirectoryResult<Room> {
        self.repo
            .resolve_room_by_name(name.trim())?
            .ok_or_else(|| not_found("room", name))
    }

    pub fn list_rooms(&self) -> DirectoryResult<Vec<Room>> {
        Ok(self.repo.list_rooms()?)
    }

    pub fn update_room(&self, name: &str, input: &RoomInput) -> DirectoryResult<Room> {
        let mut room = self.get_room(name)?;
        room.name = required(&input.name, "name")?.to_string();
        room.floor = input.floor;
        room.building_id = self.resolve_building(&input.building_name)?.id;
        self.repo
            .update_room(&room)
            .map_err(|err| classify_write(err, ROOM_UNIQUES, "room"))?;
        log_write("update_room", room.id);
        Ok(room)
    }

    pub fn delete_room(&self, name: &str) -> DirectoryResult<()> {
        let room = self.get_room(name)?;
        self.repo
            .delete_room(room.id)
            .map_err(|err| classify_write(err, &[], "room"))?;
        log_write("delete_room", room.id);
        Ok(())
    }

    pub fn create_student(&self, input: &NewStudent) -> DirectoryResult<Student> {
        let student = Student {
            id: Uuid::new_v4(),
            first_name: input.first_name.trim().to_string(),
            last_name: input.last_name.trim().to_string(),
            school_id: required(&input.school_id, "school_id")?.to_string(),
            rfid: required(&input.rfid, "rfid")?.to_string(),
            college: input.college.trim().to_string(),
            course: input.course.trim().to_string(),
            section: input.section.trim().to_string(),
        };
        self.repo
            .insert_student(&student)
            .map_err(|err| classify_write(err, STUDENT_UNIQUES, "student"))?;
        log_write("create_student", student.id);
        Ok(student)
    }

    pub fn get_student(&self, school_id: &str) -> DirectoryResult<Student> {
        self.repo
            .resolve_student_by_school_id(school_id.trim())?
            .ok_or_else(|| not_found("student", school_id))
    }

    pub fn get_student_by_rfid(&self, rfid: &str) -> DirectoryResult<Student> {
        self.repo
            .resolve_student_by_rfid(rfid.trim())?
            .ok_or_else(|| not_found("student", rfid))
    }

    pub fn list_students(&self) -> DirectoryResult<Vec<Student>> {
        Ok(self.repo.list_students()?)
    }

    pub fn update_student(
        &self,
        school_id: &str,
        input: &StudentUpdate,
    ) -> DirectoryResult<Student> {
        let mut student = self.get_student(school_id)?;
        student.first_name = input.first_name.trim().to_string();
        student.last_name = input.last_name.trim().to_string();
        student.college = input.college.trim().to_string();
        student.course = input.course.trim().to_string();
        student.section = input.section.trim().to_string();
        self.repo
            .update_student(&student)
            .map_err(|err| classify_write(err, STUDENT_UNIQUES, "student"))?;
        log_write("update_student", student.id);
        Ok(student)
    }

    pub fn delete_student(&self, school_id: &str) -> DirectoryResult<()> {
        let student = self.get_student(school_id)?;
        self.repo
            .delete_student(student.id)
            .map_err(|err| classify_write(err, &[], "student"))?;
        log_write("delete_student", student.id);
        Ok(())
    }

    pub fn create_instructor(&self, input: &NewInstructor) -> DirectoryResult<Instructor> {
        let instructor = Instructor {
            id: Uuid::new_v4(),
            first_name: input.first_name.trim().to_string(),
            last_name: input.last_name.trim().to_string(),
            school_id: required(&input.school_id, "school_id")?.to_string(),
        };
        self.repo
            .insert_instructor(&instructor)
            .map_err(|err| classify_write(err, INSTRUCTOR_UNIQUES, "instructor"))?;
        log_write("create_instructor", instructor.id);
        Ok(instructor)
    }

    pub fn get_instructor(&self, school_id: &str) -> DirectoryResult<Instructor> {
        self.repo
            .resolve_instructor_by_school_id(school_id.trim())?
            .ok_or_else(|| not_found("instructor", school_id))
    }

    pub fn list_instructors(&self) -> DirectoryResult<Vec<Instructor>> {
        Ok(self.repo.list_instructors()?)
    }

    pub fn update_instructor(
        &self,
        school_id: &str,
        input: &InstructorUpdate,
    ) -> DirectoryResult<Instructor> {
        let mut instructor = self.get_instructor(school_id)?;
        instructor.first_name = input.first_name.trim().to_string();
        instructor.last_name = input.last_name.trim().to_string();
        self.repo
            .update_instructor(&instructor)
            .map_err(|err| classify_write(err, INSTRUCTOR_UNIQUES, "instructor"))?;
        log_write("update_instructor", instructor.id);
        Ok(instructor)
    }

    pub fn delete_instructor(&self, school_id: &str) -> DirectoryResult<()> {
        let instructor = self.get_instructor(school_id)?;
        self.repo
            .delete_instructor(instructor.id)
            .map_err(|err| classify_write(err, &[], "instructor"))?;
        log_write("delete_instructor", instructor.id);
        Ok(())
    }

    /// Registers a key for a room. New keys start `available`.
    pub fn create_key(&self, input: &NewKey) -> DirectoryResult<Key> {
        let rfid = required(&input.rfid, "rfid")?;
        let building = self.resolve_building(&input.building_name)?;
        let room = self.resolve_room(&input.room_name)?;
        let key = Key::new(rfid, room.id, building.id);
        self.repo
            .insert_key(&key)
            .map_err(|err| classify_write(err, KEY_UNIQUES, "key"))?;
        log_write("create_key", key.id);
        Ok(key)
    }

    pub fn get_key(&self, rfid: &str) -> DirectoryResult<Key> {
        self.repo
            .resolve_key_by_rfid(rfid.trim())?
            .ok_or_else(|| not_found("key", rfid))
    }

    pub fn list_keys_by_building(&self, building_name: &str) -> DirectoryResult<Vec<Key>> {
        let building = self.resolve_building(building_name)?;
        Ok(self.repo.list_keys_by_building(building.id)?)
    }

    /// Moves a key and overrides its status outside the ledger.
    pub fn update_key(&self, rfid: &str, input: &KeyUpdate) -> DirectoryResult<Key> {
        let mut key = self.get_key(rfid)?;
        key.building_id = self.resolve_building(&input.building_name)?.id;
        key.room_id = self.resolve_room(&input.room_name)?.id;
        key.status = input.status;
        self.repo
            .update_key(&key)
            .map_err(|err| classify_write(err, KEY_UNIQUES, "key"))?;
        info!(
            "event=directory_write module=directory status=ok op=update_key id={} key_status={}",
            key.id, key.status
        );
        Ok(key)
    }

    pub fn delete_key(&self, rfid: &str) -> DirectoryResult<()> {
        let key = self.get_key(rfid)?;
        if self.repo.key_has_custody_history(key.id)? {
            warn!(
                "event=directory_write module=directory status=rejected op=delete_key id={} reason=still_referenced",
                key.id
            );
            return Err(Conflict::StillReferenced("key").into());
        }
        self.repo
            .delete_key(key.id)
            .map_err(|err| classify_write(err, &[], "key"))?;
        log_write("delete_key", key.id);
        Ok(())
    }

    fn resolve_building(&self, name: &str) -> DirectoryResult<Building> {
        let name = required(name, "building_name")?;
        self.repo
            .resolve_building_by_name(name)?
            .ok_or_else(|| Rejection::UnknownBuilding.into())
    }

    fn resolve_room(&self, name: &str) -> DirectoryResult<Room> {
        let name = required(name, "room_name")?;
        self.repo
            .resolve_room_by_name(name)?
            .ok_or_else(|| Rejection::UnknownRoom.into())
    }
}

fn required<'a>(value: &'a str, field: &'static str) -> DirectoryResult<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DirectoryError::InvalidInput(field));
    }
    Ok(trimmed)
}

fn not_found(entity: &'static str, key: &str) -> DirectoryError {
    DirectoryError::NotFound {
        entity,
        key: key.trim().to_string(),
    }
}

fn classify_write(
    err: RepoError,
    uniques: &[(&str, &str, Conflict)],
    entity: &'static str,
) -> DirectoryError {
    if let Some((_, _, conflict)) = uniques
        .iter()
        .find(|(table, column, _)| err.is_unique_violation_for(table, column))
    {
        warn!(
            "event=directory_write module=directory status=rejected entity={} reason=conflict",
            entity
        );
        return conflict.clone().into();
    }
    if matches!(err, RepoError::ForeignKeyViolation) {
        warn!(
            "event=directory_write module=directory status=rejected entity={} reason=still_referenced",
            entity
        );
        return Conflict::StillReferenced(entity).into();
    }
    err.into()
}

fn log_write(op: &str, id: Uuid) {
    info!(
        "event=directory_write module=directory status=ok op={} id={}",
        op, id
    );
}
