use chrono::{Local, NaiveDate, NaiveDateTime, Timelike};
use keyper_core::db::{open_db, open_db_in_memory};
use keyper_core::model::directory::StudentId;
use keyper_core::model::fact::{AttendanceFact, CustodyFact};
use keyper_core::model::key::{KeyId, KeyStatus};
use keyper_core::model::schedule::ScheduleId;
use keyper_core::service::directory_service::{
    BuildingInput, NewStudent, RoomInput, StudentUpdate,
};
use keyper_core::{
    AttendanceLedger, CreateScheduleRequest, DayScope, DirectoryService, LedgerRepository,
    Rejection, RepoResult, ScheduleService, SqliteDirectoryRepository, SqliteLedgerRepository,
    SqliteScheduleRepository,
};
use rusqlite::Connection;
use std::path::Path;
use std::thread;

type SqliteAttendanceLedger<'conn> = AttendanceLedger<
    SqliteDirectoryRepository<'conn>,
    SqliteScheduleRepository<'conn>,
    SqliteLedgerRepository<'conn>,
>;

#[test]
fn algorithms_class_in_r101_admits_once_per_day() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn);
    let ledger = ledger(&conn, DayScope::Ignore);

    let fact = ledger.admit_attendance("RF-1", "R101", at(4, 9, 15, 0)).unwrap();
    assert_eq!(fact.subject, "Algorithms");
    assert_eq!(fact.room_name, "R101");
    assert_eq!(fact.student_name, "Lovelace, Ada");
    assert_eq!(fact.section, "2A");
    assert_eq!(fact.course, "BSCS");
    assert_eq!(fact.day, NaiveDate::from_ymd_opt(2024, 3, 4).unwrap());

    let err = ledger
        .admit_attendance("RF-1", "R101", at(4, 9, 45, 0))
        .unwrap_err();
    assert_eq!(err.rejection(), Some(&Rejection::DuplicateAttendance));

    let err = ledger
        .admit_attendance("RF-1", "R101", at(4, 11, 0, 0))
        .unwrap_err();
    assert_eq!(err.rejection(), Some(&Rejection::NoActiveSchedule));

    assert_eq!(ledger.list_attendance().unwrap(), vec![fact]);
}

#[test]
fn sub_second_check_ins_match_the_window_edge_seconds() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn);
    add_student(&conn, "2021-0002", "RF-2");
    let ledger = ledger(&conn, DayScope::Ignore);
    let monday = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();

    let late = ledger
        .admit_attendance("RF-1", "R101", monday.and_hms_milli_opt(10, 30, 0, 500).unwrap())
        .unwrap();
    assert_eq!(late.recorded_at, at(4, 10, 30, 0));
    let early = ledger
        .admit_attendance("RF-2", "R101", monday.and_hms_milli_opt(9, 0, 0, 250).unwrap())
        .unwrap();
    assert_eq!(early.recorded_at, at(4, 9, 0, 0));

    let err = ledger
        .admit_attendance("RF-1", "R101", monday.and_hms_milli_opt(10, 30, 1, 0).unwrap())
        .unwrap_err();
    assert_eq!(err.rejection(), Some(&Rejection::NoActiveSchedule));
    assert_eq!(ledger.list_attendance().unwrap(), vec![late, early]);
}

#[test]
fn check_in_now_admits_against_the_local_clock() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn);
    schedules(&conn)
        .create_schedule(&request("R102", "00:00:00", "23:59:59", "Open Lab"))
        .unwrap();
    let ledger = ledger(&conn, DayScope::Ignore);

    let fact = ledger.check_in_now("RF-1", "R102").unwrap();
    assert_eq!(fact.subject, "Open Lab");
    assert_eq!(fact.recorded_at.nanosecond(), 0);
    assert_eq!(fact.day, fact.recorded_at.date());

    let repeat = ledger.check_in_now("RF-1", "R102");
    if Local::now().date_naive() == fact.day {
        let err = repeat.unwrap_err();
        assert_eq!(err.rejection(), Some(&Rejection::DuplicateAttendance));
    }
}

#[test]
fn unknown_student_is_reported_before_unknown_room() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn);
    let ledger = ledger(&conn, DayScope::Ignore);

    let cases = [
        ("RF-404", "R404", Rejection::UnknownStudent),
        ("RF-1", "R404", Rejection::UnknownRoom),
        ("", "R101", Rejection::InvalidInput("rfid")),
        ("RF-1", " ", Rejection::InvalidInput("room_name")),
    ];
    for (rfid, room_name, expected) in cases {
        let err = ledger
            .admit_attendance(rfid, room_name, at(4, 9, 15, 0))
            .unwrap_err();
        assert_eq!(err.rejection(), Some(&expected));
        assert!(!err.is_retryable());
    }
    assert!(ledger.list_attendance().unwrap().is_empty());
}

#[test]
fn each_calendar_day_admits_separately_across_midnight() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn);
    schedules(&conn)
        .create_schedule(&request("R102", "00:00:00", "23:59:59", "Night Lab"))
        .unwrap();
    let ledger = ledger(&conn, DayScope::Ignore);

    let before = ledger
        .admit_attendance("RF-1", "R102", at(4, 23, 59, 59))
        .unwrap();
    let after = ledger
        .admit_attendance("RF-1", "R102", at(5, 0, 0, 0))
        .unwrap();
    assert_eq!(before.schedule_id, after.schedule_id);
    assert_ne!(before.day, after.day);
    assert_eq!(ledger.list_attendance().unwrap().len(), 2);
}

#[test]
fn different_students_share_a_schedule_day() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn);
    add_student(&conn, "2021-0002", "RF-2");
    let ledger = ledger(&conn, DayScope::Ignore);

    ledger.admit_attendance("RF-1", "R101", at(4, 9, 15, 0)).unwrap();
    ledger.admit_attendance("RF-2", "R101", at(4, 9, 16, 0)).unwrap();
    assert_eq!(ledger.list_attendance().unwrap().len(), 2);
}

#[test]
fn snapshot_fields_survive_directory_edits() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn);
    let ledger = ledger(&conn, DayScope::Ignore);
    let fact = ledger.admit_attendance("RF-1", "R101", at(4, 9, 15, 0)).unwrap();

    DirectoryService::new(SqliteDirectoryRepository::try_new(&conn).unwrap())
        .update_student(
            "2021-0001",
            &StudentUpdate {
                first_name: "Ada".to_string(),
                last_name: "King".to_string(),
                college: "CCS".to_string(),
                course: "BSIT".to_string(),
                section: "4C".to_string(),
            },
        )
        .unwrap();

    let stored = ledger.list_attendance().unwrap();
    assert_eq!(stored, vec![fact]);
    assert_eq!(stored[0].student_name, "Lovelace, Ada");
    assert_eq!(stored[0].section, "2A");
}

#[test]
fn enforced_day_scope_rejects_other_weekdays() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn);
    let ledger = ledger(&conn, DayScope::Enforce);

    // The seeded class meets on Monday; 2024-03-05 is a Tuesday.
    ledger.admit_attendance("RF-1", "R101", at(4, 9, 15, 0)).unwrap();
    let err = ledger
        .admit_attendance("RF-1", "R101", at(5, 9, 15, 0))
        .unwrap_err();
    assert_eq!(err.rejection(), Some(&Rejection::NoActiveSchedule));
}

#[test]
fn unique_violation_on_commit_is_reported_as_duplicate() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn);
    let ledger = AttendanceLedger::new(
        SqliteDirectoryRepository::try_new(&conn).unwrap(),
        SqliteScheduleRepository::try_new(&conn).unwrap(),
        BlindLedger(SqliteLedgerRepository::try_new(&conn).unwrap()),
        DayScope::Ignore,
    );

    ledger.admit_attendance("RF-1", "R101", at(4, 9, 15, 0)).unwrap();
    let err = ledger
        .admit_attendance("RF-1", "R101", at(4, 9, 20, 0))
        .unwrap_err();
    assert_eq!(err.rejection(), Some(&Rejection::DuplicateAttendance));
    assert!(!err.is_retryable());
    assert_eq!(ledger.list_attendance().unwrap().len(), 1);
}

#[test]
fn concurrent_check_ins_on_separate_connections_admit_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("keyper.db");
    seed(&open_db(&path).unwrap());

    let outcomes: Vec<Result<(), Rejection>> = thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| scope.spawn(|| check_in_on_own_connection(&path)))
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect()
    });

    let admitted = outcomes.iter().filter(|outcome| outcome.is_ok()).count();
    assert_eq!(admitted, 1);
    for outcome in outcomes.iter().filter(|outcome| outcome.is_err()) {
        assert_eq!(outcome, &Err(Rejection::DuplicateAttendance));
    }

    let conn = open_db(&path).unwrap();
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM attendance;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 1);
}

fn check_in_on_own_connection(path: &Path) -> Result<(), Rejection> {
    let conn = open_db(path).unwrap();
    let ledger = ledger(&conn, DayScope::Ignore);
    match ledger.admit_attendance("RF-1", "R101", at(4, 9, 15, 0)) {
        Ok(_) => Ok(()),
        Err(err) => Err(err.rejection().cloned().unwrap()),
    }
}

/// Ledger whose duplicate lookup never sees committed rows, leaving the
/// storage constraint as the only guard.
struct BlindLedger<'conn>(SqliteLedgerRepository<'conn>);

impl LedgerRepository for BlindLedger<'_> {
    fn find_attendance(
        &self,
        _schedule_id: ScheduleId,
        _student_id: StudentId,
        _day: NaiveDate,
    ) -> RepoResult<Option<AttendanceFact>> {
        Ok(None)
    }

    fn commit_attendance(&self, fact: &AttendanceFact) -> RepoResult<()> {
        self.0.commit_attendance(fact)
    }

    fn commit_record(
        &self,
        fact: &CustodyFact,
        expected: KeyStatus,
        next: KeyStatus,
    ) -> RepoResult<()> {
        self.0.commit_record(fact, expected, next)
    }

    fn list_attendance(&self) -> RepoResult<Vec<AttendanceFact>> {
        self.0.list_attendance()
    }

    fn list_records(&self) -> RepoResult<Vec<CustodyFact>> {
        self.0.list_records()
    }

    fn list_records_for_key(&self, key_id: KeyId) -> RepoResult<Vec<CustodyFact>> {
        self.0.list_records_for_key(key_id)
    }
}

fn seed(conn: &Connection) {
    let directory = DirectoryService::new(SqliteDirectoryRepository::try_new(conn).unwrap());
    directory
        .create_building(&BuildingInput {
            name: "Main".to_string(),
            abbrv: "M".to_string(),
        })
        .unwrap();
    for name in ["R101", "R102"] {
        directory
            .create_room(&RoomInput {
                name: name.to_string(),
                floor: 1,
                building_name: "Main".to_string(),
            })
            .unwrap();
    }
    add_student(conn, "2021-0001", "RF-1");
    schedules(conn)
        .create_schedule(&request("R101", "09:00:00", "10:30:00", "Algorithms"))
        .unwrap();
}

fn add_student(conn: &Connection, school_id: &str, rfid: &str) {
    DirectoryService::new(SqliteDirectoryRepository::try_new(conn).unwrap())
        .create_student(&NewStudent {
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            school_id: school_id.to_string(),
            rfid: rfid.to_string(),
            college: "CCS".to_string(),
            course: "BSCS".to_string(),
            section: "2A".to_string(),
        })
        .unwrap();
}

fn schedules(
    conn: &Connection,
) -> ScheduleService<SqliteScheduleRepository<'_>, SqliteDirectoryRepository<'_>> {
    ScheduleService::new(
        SqliteScheduleRepository::try_new(conn).unwrap(),
        SqliteDirectoryRepository::try_new(conn).unwrap(),
        DayScope::Ignore,
    )
}

fn ledger(conn: &Connection, day_scope: DayScope) -> SqliteAttendanceLedger<'_> {
    AttendanceLedger::new(
        SqliteDirectoryRepository::try_new(conn).unwrap(),
        SqliteScheduleRepository::try_new(conn).unwrap(),
        SqliteLedgerRepository::try_new(conn).unwrap(),
        day_scope,
    )
}

fn request(room_name: &str, start: &str, end: &str, subject: &str) -> CreateScheduleRequest {
    CreateScheduleRequest {
        room_name: room_name.to_string(),
        start_time: start.to_string(),
        end_time: end.to_string(),
        day_of_week: "Monday".to_string(),
        subject: subject.to_string(),
        instructor_name: "Dr. Reyes".to_string(),
    }
}

/// Instant on 2024-03-`day` (the 4th is a Monday).
fn at(day: u32, h: u32, m: u32, s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, day)
        .unwrap()
        .and_hms_opt(h, m, s)
        .unwrap()
}
