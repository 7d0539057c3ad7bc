use keyper_core::db::open_db_in_memory;
use keyper_core::service::directory_service::{
    BuildingInput, InstructorUpdate, KeyUpdate, NewInstructor, NewKey, NewStudent, RoomInput,
    StudentUpdate,
};
use keyper_core::{
    Conflict, CustodyPolicy, DirectoryError, DirectoryService, KeyStatus, RecordLedger,
    RecordType, Rejection, SqliteDirectoryRepository, SqliteLedgerRepository,
};
use rusqlite::Connection;

#[test]
fn building_create_get_update_delete() {
    let conn = open_db_in_memory().unwrap();
    let service = directory(&conn);

    let created = service
        .create_building(&building_input("  Engineering Hall ", "EH"))
        .unwrap();
    assert_eq!(created.name, "Engineering Hall");
    assert_eq!(service.get_building("Engineering Hall").unwrap(), created);

    let renamed = service
        .update_building("Engineering Hall", &building_input("Science Hall", "SH"))
        .unwrap();
    assert_eq!(renamed.id, created.id);
    assert_eq!(renamed.abbrv, "SH");
    assert!(matches!(
        service.get_building("Engineering Hall"),
        Err(DirectoryError::NotFound { entity: "building", .. })
    ));

    service.delete_building("Science Hall").unwrap();
    assert!(service.list_buildings().unwrap().is_empty());
}

#[test]
fn blank_and_duplicate_building_names_are_rejected() {
    let conn = open_db_in_memory().unwrap();
    let service = directory(&conn);

    assert!(matches!(
        service.create_building(&building_input("   ", "X")),
        Err(DirectoryError::InvalidInput("name"))
    ));

    service.create_building(&building_input("Main", "M")).unwrap();
    service.create_building(&building_input("Annex", "A")).unwrap();
    assert!(matches!(
        service.create_building(&building_input("Main", "M2")),
        Err(DirectoryError::Conflict(Conflict::DuplicateBuildingName))
    ));
    assert!(matches!(
        service.update_building("Annex", &building_input("Main", "A")),
        Err(DirectoryError::Conflict(Conflict::DuplicateBuildingName))
    ));
}

#[test]
fn rooms_require_known_building_and_unique_name() {
    let conn = open_db_in_memory().unwrap();
    let service = directory(&conn);
    service.create_building(&building_input("Main", "M")).unwrap();

    assert!(matches!(
        service.create_room(&room_input("R101", "Nowhere")),
        Err(DirectoryError::Rejected(Rejection::UnknownBuilding))
    ));

    let room = service.create_room(&room_input("R101", "Main")).unwrap();
    assert_eq!(room.floor, 1);
    assert!(matches!(
        service.create_room(&room_input("R101", "Main")),
        Err(DirectoryError::Conflict(Conflict::DuplicateRoomName))
    ));

    let moved = service
        .update_room(
            "R101",
            &RoomInput {
                name: "R102".to_string(),
                floor: 2,
                building_name: "Main".to_string(),
            },
        )
        .unwrap();
    assert_eq!(moved.id, room.id);
    assert_eq!(service.get_room("R102").unwrap().floor, 2);
}

#[test]
fn referenced_building_cannot_be_deleted() {
    let conn = open_db_in_memory().unwrap();
    let service = directory(&conn);
    service.create_building(&building_input("Main", "M")).unwrap();
    service.create_room(&room_input("R101", "Main")).unwrap();

    assert!(matches!(
        service.delete_building("Main"),
        Err(DirectoryError::Conflict(Conflict::StillReferenced("building")))
    ));
    assert!(matches!(
        service.delete_building("Annex"),
        Err(DirectoryError::NotFound { .. })
    ));
}

#[test]
fn students_are_unique_by_school_id_and_rfid() {
    let conn = open_db_in_memory().unwrap();
    let service = directory(&conn);

    let created = service.create_student(&student("2021-0001", "RF-1")).unwrap();
    assert_eq!(service.get_student("2021-0001").unwrap(), created);
    assert_eq!(service.get_student_by_rfid("RF-1").unwrap(), created);

    assert!(matches!(
        service.create_student(&student("2021-0001", "RF-2")),
        Err(DirectoryError::Conflict(Conflict::DuplicateStudentSchoolId))
    ));
    assert!(matches!(
        service.create_student(&student("2021-0002", "RF-1")),
        Err(DirectoryError::Conflict(Conflict::DuplicateStudentRfid))
    ));
    assert!(matches!(
        service.create_student(&student("", "RF-3")),
        Err(DirectoryError::InvalidInput("school_id"))
    ));
}

#[test]
fn student_update_keeps_identity_fields() {
    let conn = open_db_in_memory().unwrap();
    let service = directory(&conn);
    let created = service.create_student(&student("2021-0001", "RF-1")).unwrap();

    let updated = service
        .update_student(
            "2021-0001",
            &StudentUpdate {
                first_name: "Grace".to_string(),
                last_name: "Hopper".to_string(),
                college: "CCS".to_string(),
                course: "BSIT".to_string(),
                section: "3B".to_string(),
            },
        )
        .unwrap();
    assert_eq!(updated.id, created.id);
    assert_eq!(updated.rfid, "RF-1");
    assert_eq!(updated.display_name(), "Hopper, Grace");

    service.delete_student("2021-0001").unwrap();
    assert!(service.list_students().unwrap().is_empty());
}

#[test]
fn instructor_crud_rejects_duplicate_school_id() {
    let conn = open_db_in_memory().unwrap();
    let service = directory(&conn);

    let instructor = NewInstructor {
        first_name: "Jose".to_string(),
        last_name: "Reyes".to_string(),
        school_id: "F-100".to_string(),
    };
    service.create_instructor(&instructor).unwrap();
    assert!(matches!(
        service.create_instructor(&instructor),
        Err(DirectoryError::Conflict(Conflict::DuplicateInstructorSchoolId))
    ));

    let updated = service
        .update_instructor(
            "F-100",
            &InstructorUpdate {
                first_name: "Josefa".to_string(),
                last_name: "Reyes".to_string(),
            },
        )
        .unwrap();
    assert_eq!(updated.first_name, "Josefa");
    assert_eq!(service.list_instructors().unwrap().len(), 1);

    service.delete_instructor("F-100").unwrap();
    assert!(matches!(
        service.get_instructor("F-100"),
        Err(DirectoryError::NotFound { entity: "instructor", .. })
    ));
}

#[test]
fn keys_are_unique_per_tag_and_per_room() {
    let conn = open_db_in_memory().unwrap();
    let service = directory(&conn);
    service.create_building(&building_input("Main", "M")).unwrap();
    service.create_room(&room_input("R101", "Main")).unwrap();
    service.create_room(&room_input("R102", "Main")).unwrap();

    let key = service.create_key(&new_key("K-101", "R101")).unwrap();
    assert_eq!(key.status, KeyStatus::Available);

    assert!(matches!(
        service.create_key(&new_key("K-101", "R102")),
        Err(DirectoryError::Conflict(Conflict::DuplicateKeyTag))
    ));
    assert!(matches!(
        service.create_key(&new_key("K-999", "R101")),
        Err(DirectoryError::Conflict(Conflict::RoomAlreadyKeyed))
    ));
    assert!(matches!(
        service.create_key(&new_key("K-102", "R404")),
        Err(DirectoryError::Rejected(Rejection::UnknownRoom))
    ));

    let keys = service.list_keys_by_building("Main").unwrap();
    assert_eq!(keys, vec![key]);
    assert!(matches!(
        service.list_keys_by_building("Annex"),
        Err(DirectoryError::Rejected(Rejection::UnknownBuilding))
    ));
}

#[test]
fn key_admin_correction_restores_lost_key() {
    let conn = open_db_in_memory().unwrap();
    let service = directory(&conn);
    service.create_building(&building_input("Main", "M")).unwrap();
    service.create_room(&room_input("R101", "Main")).unwrap();
    service.create_room(&room_input("R102", "Main")).unwrap();
    service.create_key(&new_key("K-101", "R101")).unwrap();

    let lost = service
        .update_key("K-101", &key_update("R101", KeyStatus::Lost))
        .unwrap();
    assert_eq!(lost.status, KeyStatus::Lost);

    let restored = service
        .update_key("K-101", &key_update("R102", KeyStatus::Available))
        .unwrap();
    assert_eq!(restored.status, KeyStatus::Available);
    assert_eq!(restored.room_id, service.get_room("R102").unwrap().id);
}

#[test]
fn key_with_custody_history_cannot_be_deleted() {
    let conn = open_db_in_memory().unwrap();
    let service = directory(&conn);
    service.create_building(&building_input("Main", "M")).unwrap();
    service.create_room(&room_input("R101", "Main")).unwrap();
    service.create_room(&room_input("R102", "Main")).unwrap();
    service.create_student(&student("2021-0001", "RF-1")).unwrap();
    service.create_key(&new_key("K-101", "R101")).unwrap();
    service.create_key(&new_key("K-102", "R102")).unwrap();

    let ledger = RecordLedger::new(
        SqliteDirectoryRepository::try_new(&conn).unwrap(),
        SqliteLedgerRepository::try_new(&conn).unwrap(),
        CustodyPolicy::Total,
    );
    ledger
        .admit_record(RecordType::Borrow, "2021-0001", "K-101", "R101")
        .unwrap();

    assert!(matches!(
        service.delete_key("K-101"),
        Err(DirectoryError::Conflict(Conflict::StillReferenced("key")))
    ));
    assert!(matches!(
        service.delete_student("2021-0001"),
        Err(DirectoryError::Conflict(Conflict::StillReferenced("student")))
    ));

    service.delete_key("K-102").unwrap();
    assert!(matches!(
        service.get_key("K-102"),
        Err(DirectoryError::NotFound { entity: "key", .. })
    ));
}

fn directory(conn: &Connection) -> DirectoryService<SqliteDirectoryRepository<'_>> {
    DirectoryService::new(SqliteDirectoryRepository::try_new(conn).unwrap())
}

fn building_input(name: &str, abbrv: &str) -> BuildingInput {
    BuildingInput {
        name: name.to_string(),
        abbrv: abbrv.to_string(),
    }
}

fn room_input(name: &str, building_name: &str) -> RoomInput {
    RoomInput {
        name: name.to_string(),
        floor: 1,
        building_name: building_name.to_string(),
    }
}

fn student(school_id: &str, rfid: &str) -> NewStudent {
    NewStudent {
        first_name: "Ada".to_string(),
        last_name: "Lovelace".to_string(),
        school_id: school_id.to_string(),
        rfid: rfid.to_string(),
        college: "CCS".to_string(),
        course: "BSCS".to_string(),
        section: "2A".to_string(),
    }
}

fn new_key(rfid: &str, room_name: &str) -> NewKey {
    NewKey {
        rfid: rfid.to_string(),
        building_name: "Main".to_string(),
        room_name: room_name.to_string(),
    }
}

fn key_update(room_name: &str, status: KeyStatus) -> KeyUpdate {
    KeyUpdate {
        building_name: "Main".to_string(),
        room_name: room_name.to_string(),
        status,
    }
}
