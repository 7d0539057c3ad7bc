use keyper_core::db::migrations::{current_user_version, latest_version};
use keyper_core::db::{open_db, open_db_in_memory, DbError};
use keyper_core::{RepoError, SqliteDirectoryRepository, SqliteLedgerRepository};
use rusqlite::Connection;

const KEYPER_TABLES: [&str; 8] = [
    "attendance",
    "buildings",
    "custody_records",
    "instructors",
    "keys",
    "rooms",
    "schedules",
    "students",
];

#[test]
fn fresh_database_has_every_keyper_table() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(current_user_version(&conn).unwrap(), latest_version());
    assert_eq!(table_names(&conn), KEYPER_TABLES);
}

#[test]
fn opened_connections_enforce_foreign_keys() {
    let conn = open_db_in_memory().unwrap();
    let enabled: bool = conn
        .pragma_query_value(None, "foreign_keys", |row| row.get(0))
        .unwrap();
    assert!(enabled);
}

#[test]
fn reopening_a_file_keeps_schema_and_rows() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("keyper.db");

    {
        let conn = open_db(&path).unwrap();
        conn.execute(
            "INSERT INTO buildings (uuid, name, abbrv) VALUES ('b-1', 'Main', 'M');",
            [],
        )
        .unwrap();
    }

    let conn = open_db(&path).unwrap();
    assert_eq!(current_user_version(&conn).unwrap(), latest_version());
    let buildings: i64 = conn
        .query_row("SELECT COUNT(*) FROM buildings;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(buildings, 1);
}

#[test]
fn database_from_a_newer_build_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");
    Connection::open(&path)
        .unwrap()
        .pragma_update(None, "user_version", latest_version() + 1)
        .unwrap();

    match open_db(&path) {
        Err(DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        }) => {
            assert_eq!(db_version, latest_version() + 1);
            assert_eq!(latest_supported, latest_version());
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("newer schema was accepted"),
    }
}

#[test]
fn repositories_refuse_unmigrated_connections() {
    let conn = Connection::open_in_memory().unwrap();

    assert!(matches!(
        SqliteDirectoryRepository::try_new(&conn),
        Err(RepoError::UninitializedConnection {
            actual_version: 0,
            ..
        })
    ));
    assert!(matches!(
        SqliteLedgerRepository::try_new(&conn),
        Err(RepoError::UninitializedConnection { .. })
    ));
}

#[test]
fn repositories_refuse_a_stamped_but_empty_schema() {
    let conn = Connection::open_in_memory().unwrap();
    conn.pragma_update(None, "user_version", latest_version())
        .unwrap();

    assert!(matches!(
        SqliteDirectoryRepository::try_new(&conn),
        Err(RepoError::MissingRequiredTable(_))
    ));
}

#[test]
fn attendance_uniqueness_is_backed_by_an_index() {
    let conn = open_db_in_memory().unwrap();
    let unique: bool = conn
        .query_row(
            "SELECT \"unique\" FROM pragma_index_list('attendance')
             WHERE name = 'ux_attendance_schedule_student_day';",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert!(unique);
}

fn table_names(conn: &Connection) -> Vec<String> {
    let mut stmt = conn
        .prepare(
            "SELECT name FROM sqlite_master
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
             ORDER BY name;",
        )
        .unwrap();
    stmt.query_map([], |row| row.get(0))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap()
}
