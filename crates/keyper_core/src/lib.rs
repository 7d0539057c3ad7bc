//! Core domain logic for Keyper.
//! This crate owns key custody and attendance invariants.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{ConfigError, CoreConfig, CustodyPolicy, DayScope, LedgerPolicy};
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use logging::{
    default_log_level, init_logging, init_logging_from_config, logging_status, LoggingStatus,
};
pub use model::directory::{Building, Instructor, Room, Student};
pub use model::fact::{AttendanceFact, CustodyFact};
pub use model::key::{apply_transition, check_transition, Key, KeyStatus, RecordType};
pub use model::schedule::{is_valid_time_format, Schedule};
pub use repo::directory_repo::{DirectoryRepository, SqliteDirectoryRepository};
pub use repo::ledger_repo::{LedgerRepository, SqliteLedgerRepository};
pub use repo::schedule_repo::{ScheduleRepository, SqliteScheduleRepository};
pub use repo::{RepoError, RepoResult};
pub use service::admission::{AdmissionError, AdmissionResult, Rejection};
pub use service::attendance_ledger::AttendanceLedger;
pub use service::directory_service::{Conflict, DirectoryError, DirectoryService};
pub use service::record_ledger::RecordLedger;
pub use service::schedule_service::{
    select_active_schedule, CreateScheduleRequest, ScheduleService, ScheduleServiceError,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
