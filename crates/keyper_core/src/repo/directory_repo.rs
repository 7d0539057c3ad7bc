//! Directory repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Resolve buildings, rooms, students, instructors and keys by natural key
//!   and by id for the ledgers.
//! - Persist directory CRUD writes issued by the directory service.
//!
//! # Invariants
//! - Lookups return `Ok(None)` for unknown natural keys; absence is never an
//!   error at this layer.
//! - Key `status` is only written here by `insert_key`/`update_key` (admin
//!   path). The record ledger writes status through `LedgerRepository`.

use super::support::{
    ensure_connection_ready, get_uuid, query_all, query_optional, require_changed, TableShape,
};
use super::{RepoError, RepoResult};
use crate::model::directory::{
    Building, BuildingId, Instructor, InstructorId, Room, RoomId, Student, StudentId,
};
use crate::model::key::{Key, KeyId, KeyStatus};
use rusqlite::{params, Connection, Row};

const REQUIRED_TABLES: &[TableShape] = &[
    ("buildings", &["uuid", "name", "abbrv"]),
    ("rooms", &["uuid", "name", "floor", "building_uuid"]),
    (
        "students",
        &[
            "uuid",
            "first_name",
            "last_name",
            "school_id",
            "rfid",
            "college",
            "course",
            "section",
        ],
    ),
    (
        "instructors",
        &["uuid", "first_name", "last_name", "school_id"],
    ),
    (
        "keys",
        &["uuid", "rfid", "status", "room_uuid", "building_uuid"],
    ),
];

const BUILDING_SELECT_SQL: &str = "SELECT uuid, name, abbrv FROM buildings";
const ROOM_SELECT_SQL: &str = "SELECT uuid, name, floor, building_uuid FROM rooms";
const STUDENT_SELECT_SQL: &str = "SELECT
    uuid,
    first_name,
    last_name,
    school_id,
    rfid,
    college,
    course,
    section
FROM students";
const INSTRUCTOR_SELECT_SQL: &str =
    "SELECT uuid, first_name, last_name, school_id FROM instructors";
const KEY_SELECT_SQL: &str = "SELECT uuid, rfid, status, room_uuid, building_uuid FROM keys";

/// Repository interface for directory lookups and CRUD writes.
pub trait DirectoryRepository {
    fn insert_building(&self, building: &Building) -> RepoResult<()>;
    fn update_building(&self, building: &Building) -> RepoResult<()>;
    fn delete_building(&self, id: BuildingId) -> RepoResult<()>;
    fn resolve_building_by_name(&self, name: &str) -> RepoResult<Option<Building>>;
    fn resolve_building_by_id(&self, id: BuildingId) -> RepoResult<Option<Building>>;
    fn list_buildings(&self) -> RepoResult<Vec<Building>>;

    fn insert_room(&self, room: &Room) -> RepoResult<()>;
    fn update_room(&self, room: &Room) -> RepoResult<()>;
    fn delete_room(&self, id: RoomId) -> RepoResult<()>;
    fn resolve_room_by_name(&self, name: &str) -> RepoResult<Option<Room>>;
    fn resolve_room_by_id(&self, id: RoomId) -> RepoResult<Option<Room>>;
    fn list_rooms(&self) -> RepoResult<Vec<Room>>;

    fn insert_student(&self, student: &Student) -> RepoResult<()>;
    fn update_student(&self, student: &Student) -> RepoResult<()>;
    fn delete_student(&self, id: StudentId) -> RepoResult<()>;
    fn resolve_student_by_school_id(&self, school_id: &str) -> RepoResult<Option<Student>>;
    fn resolve_student_by_rfid(&self, rfid: &str) -> RepoResult<Option<Student>>;
    fn list_students(&self) -> RepoResult<Vec<Student>>;

    fn insert_instructor(&self, instructor: &Instructor) -> RepoResult<()>;
    fn update_instructor(&self, instructor: &Instructor) -> RepoResult<()>;
    fn delete_instructor(&self, id: InstructorId) -> RepoResult<()>;
    fn resolve_instructor_by_school_id(&self, school_id: &str) -> RepoResult<Option<Instructor>>;
    fn list_instructors(&self) -> RepoResult<Vec<Instructor>>;

    fn insert_key(&self, key: &Key) -> RepoResult<()>;
    fn update_key(&self, key: &Key) -> RepoResult<()>;
    fn delete_key(&self, id: KeyId) -> RepoResult<()>;
    fn resolve_key_by_rfid(&self, rfid: &str) -> RepoResult<Option<Key>>;
    fn resolve_key_by_room(&self, room_id: RoomId) -> RepoResult<Option<Key>>;
    fn list_keys_by_building(&self, building_id: BuildingId) -> RepoResult<Vec<Key>>;
    /// Returns whether any custody fact references the key.
    fn key_has_custody_history(&self, id: KeyId) -> RepoResult<bool>;
}

/// SQLite-backed directory repository.
pub struct SqliteDirectoryRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteDirectoryRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, REQUIRED_TABLES)?;
        Ok(Self { conn })
    }
}

impl DirectoryRepository for SqliteDirectoryRepository<'_> {
    fn insert_building(&self, building: &Building) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO buildings (uuid, name, abbrv) VALUES (?1, ?2, ?3);",
            params![
                building.id.to_string(),
                building.name.as_str(),
                building.abbrv.as_str()
            ],
        )?;
        Ok(())
    }

    fn update_building(&self, building: &Building) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE buildings
             SET name = ?2,
                 abbrv = ?3,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1;",
            params![
                building.id.to_string(),
                building.name.as_str(),
                building.abbrv.as_str()
            ],
        )?;
        require_changed(changed, "building", building.id)
    }

    fn delete_building(&self, id: BuildingId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM buildings WHERE uuid = ?1;", [id.to_string()])?;
        require_changed(changed, "building", id)
    }

    fn resolve_building_by_name(&self, name: &str) -> RepoResult<Option<Building>> {
        query_optional(
            self.conn,
            &format!("{BUILDING_SELECT_SQL} WHERE name = ?1;"),
            [name],
            parse_building_row,
        )
    }

    fn resolve_building_by_id(&self, id: BuildingId) -> RepoResult<Option<Building>> {
        query_optional(
            self.conn,
            &format!("{BUILDING_SELECT_SQL} WHERE uuid = ?1;"),
            [id.to_string()],
            parse_building_row,
        )
    }

    fn list_buildings(&self) -> RepoResult<Vec<Building>> {
        query_all(
            self.conn,
            &format!("{BUILDING_SELECT_SQL} ORDER BY name ASC;"),
            [],
            parse_building_row,
        )
    }

    fn insert_room(&self, room: &Room) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO rooms (uuid, name, floor, building_uuid) VALUES (?1, ?2, ?3, ?4);",
            params![
                room.id.to_string(),
                room.name.as_str(),
                room.floor,
                room.building_id.to_string()
            ],
        )?;
        Ok(())
    }

    fn update_room(&self, room: &Room) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE rooms
             SET name = ?2,
                 floor = ?3,
                 building_uuid = ?4,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1;",
            params![
                room.id.to_string(),
                room.name.as_str(),
                room.floor,
                room.building_id.to_string()
            ],
        )?;
        require_changed(changed, "room", room.id)
    }

    fn delete_room(&self, id: RoomId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM rooms WHERE uuid = ?1;", [id.to_string()])?;
        require_changed(changed, "room", id)
    }

    fn resolve_room_by_name(&self, name: &str) -> RepoResult<Option<Room>> {
        query_optional(
            self.conn,
            &format!("{ROOM_SELECT_SQL} WHERE name = ?1;"),
            [name],
            parse_room_row,
        )
    }

    fn resolve_room_by_id(&self, id: RoomId) -> RepoResult<Option<Room>> {
        query_optional(
            self.conn,
            &format!("{ROOM_SELECT_SQL} WHERE uuid = ?1;"),
            [id.to_string()],
            parse_room_row,
        )
    }

    fn list_rooms(&self) -> RepoResult<Vec<Room>> {
        query_all(
            self.conn,
            &format!("{ROOM_SELECT_SQL} ORDER BY name ASC;"),
            [],
            parse_room_row,
        )
    }

    fn insert_student(&self, student: &Student) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO students (
                uuid,
                first_name,
                last_name,
                school_id,
                rfid,
                college,
                course,
                section
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                student.id.to_string(),
                student.first_name.as_str(),
                student.last_name.as_str(),
                student.school_id.as_str(),
                student.rfid.as_str(),
                student.college.as_str(),
                student.course.as_str(),
                student.section.as_str(),
            ],
        )?;
        Ok(())
    }

    fn update_student(&self, student: &Student) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE students
             SET
                first_name = ?2,
                last_name = ?3,
                school_id = ?4,
                rfid = ?5,
                college = ?6,
                course = ?7,
                section = ?8,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1;",
            params![
                student.id.to_string(),
                student.first_name.as_str(),
                student.last_name.as_str(),
                student.school_id.as_str(),
                student.rfid.as_str(),
                student.college.as_str(),
                student.course.as_str(),
                student.section.as_str(),
            ],
        )?;
        require_changed(changed, "student", student.id)
    }

    fn delete_student(&self, id: StudentId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM students WHERE uuid = ?1;", [id.to_string()])?;
        require_changed(changed, "student", id)
    }

    fn resolve_student_by_school_id(&self, school_id: &str) -> RepoResult<Option<Student>> {
        query_optional(
            self.conn,
            &format!("{STUDENT_SELECT_SQL} WHERE school_id = ?1;"),
            [school_id],
            parse_student_row,
        )
    }

    fn resolve_student_by_rfid(&self, rfid: &str) -> RepoResult<Option<Student>> {
        query_optional(
            self.conn,
            &format!("{STUDENT_SELECT_SQL} WHERE rfid = ?1;"),
            [rfid],
            parse_student_row,
        )
    }

    fn list_students(&self) -> RepoResult<Vec<Student>> {
        query_all(
            self.conn,
            &format!("{STUDENT_SELECT_SQL} ORDER BY last_name ASC, first_name ASC, uuid ASC;"),
            [],
            parse_student_row,
        )
    }

    fn insert_instructor(&self, instructor: &Instructor) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO instructors (uuid, first_name, last_name, school_id)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                instructor.id.to_string(),
                instructor.first_name.as_str(),
                instructor.last_name.as_str(),
                instructor.school_id.as_str(),
            ],
        )?;
        Ok(())
    }

    fn update_instructor(&self, instructor: &Instructor) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE instructors
             SET first_name = ?2,
                 last_name = ?3,
                 school_id = ?4,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1;",
            params![
                instructor.id.to_string(),
                instructor.first_name.as_str(),
                instructor.last_name.as_str(),
                instructor.school_id.as_str(),
            ],
        )?;
        require_changed(changed, "instructor", instructor.id)
    }

    fn delete_instructor(&self, id: InstructorId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM instructors WHERE uuid = ?1;", [id.to_string()])?;
        require_changed(changed, "instructor", id)
    }

    fn resolve_instructor_by_school_id(&self, school_id: &str) -> RepoResult<Option<Instructor>> {
        query_optional(
            self.conn,
            &format!("{INSTRUCTOR_SELECT_SQL} WHERE school_id = ?1;"),
            [school_id],
            parse_instructor_row,
        )
    }

    fn list_instructors(&self) -> RepoResult<Vec<Instructor>> {
        query_all(
            self.conn,
            &format!("{INSTRUCTOR_SELECT_SQL} ORDER BY last_name ASC, first_name ASC, uuid ASC;"),
            [],
            parse_instructor_row,
        )
    }

    fn insert_key(&self, key: &Key) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO keys (uuid, rfid, status, room_uuid, building_uuid)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                key.id.to_string(),
                key.rfid.as_str(),
                key.status.as_str(),
                key.room_id.to_string(),
                key.building_id.to_string(),
            ],
        )?;
        Ok(())
    }

    fn update_key(&self, key: &Key) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE keys
             SET rfid = ?2,
                 status = ?3,
                 room_uuid = ?4,
                 building_uuid = ?5,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1;",
            params![
                key.id.to_string(),
                key.rfid.as_str(),
                key.status.as_str(),
                key.room_id.to_string(),
                key.building_id.to_string(),
            ],
        )?;
        require_changed(changed, "key", key.id)
    }

    fn delete_key(&self, id: KeyId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM keys WHERE uuid = ?1;", [id.to_string()])?;
        require_changed(changed, "key", id)
    }

    fn resolve_key_by_rfid(&self, rfid: &str) -> RepoResult<Option<Key>> {
        query_optional(
            self.conn,
            &format!("{KEY_SELECT_SQL} WHERE rfid = ?1;"),
            [rfid],
            parse_key_row,
        )
    }

    fn resolve_key_by_room(&self, room_id: RoomId) -> RepoResult<Option<Key>> {
        query_optional(
            self.conn,
            &format!("{KEY_SELECT_SQL} WHERE room_uuid = ?1;"),
            [room_id.to_string()],
            parse_key_row,
        )
    }

    fn list_keys_by_building(&self, building_id: BuildingId) -> RepoResult<Vec<Key>> {
        query_all(
            self.conn,
            &format!("{KEY_SELECT_SQL} WHERE building_uuid = ?1 ORDER BY rfid ASC;"),
            [building_id.to_string()],
            parse_key_row,
        )
    }

    fn key_has_custody_history(&self, id: KeyId) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(
                SELECT 1 FROM custody_records WHERE key_uuid = ?1
            );",
            [id.to_string()],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }
}

fn parse_building_row(row: &Row<'_>) -> RepoResult<Building> {
    Ok(Building {
        id: get_uuid(row, "uuid")?,
        name: row.get("name")?,
        abbrv: row.get("abbrv")?,
    })
}

fn parse_room_row(row: &Row<'_>) -> RepoResult<Room> {
    Ok(Room {
        id: get_uuid(row, "uuid")?,
        name: row.get("name")?,
        floor: row.get("floor")?,
        building_id: get_uuid(row, "building_uuid")?,
    })
}

fn parse_student_row(row: &Row<'_>) -> RepoResult<Student> {
    Ok(Student {
        id: get_uuid(row, "uuid")?,
        first_name: row.get("first_name")?,
        last_name: row.get("last_name")?,
        school_id: row.get("school_id")?,
        rfid: row.get("rfid")?,
        college: row.get("college")?,
        course: row.get("course")?,
        section: row.get("section")?,
    })
}

fn parse_instructor_row(row: &Row<'_>) -> RepoResult<Instructor> {
    Ok(Instructor {
        id: get_uuid(row, "uuid")?,
        first_name: row.get("first_name")?,
        last_name: row.get("last_name")?,
        school_id: row.get("school_id")?,
    })
}

pub(crate) fn parse_key_row(row: &Row<'_>) -> RepoResult<Key> {
    let status_text: String = row.get("status")?;
    let status = status_text.parse::<KeyStatus>().map_err(|_| {
        RepoError::InvalidData(format!("invalid key status `{status_text}` in keys.status"))
    })?;

    Ok(Key {
        id: get_uuid(row, "uuid")?,
        rfid: row.get("rfid")?,
        status,
        room_id: get_uuid(row, "room_uuid")?,
        building_id: get_uuid(row, "building_uuid")?,
    })
}
