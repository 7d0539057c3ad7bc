//! CLI smoke entry point.
//!
//! # Responsibility
//! - Open the database named by `KEYPER_*` configuration.
//! - Print version, schema version and directory/ledger counts.

use keyper_core::db::migrations::current_user_version;
use keyper_core::{
    core_version, init_logging_from_config, open_db, open_db_in_memory, CoreConfig,
    DirectoryRepository, LedgerRepository, ScheduleRepository, SqliteDirectoryRepository,
    SqliteLedgerRepository, SqliteScheduleRepository,
};
use log::info;
use rusqlite::Connection;
use std::error::Error;
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("keyper: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let config = CoreConfig::from_env()?;
    init_logging_from_config(&config)?;

    let conn = match &config.db_path {
        Some(path) => open_db(path)?,
        None => open_db_in_memory()?,
    };
    info!(
        "event=cli_start module=cli status=ok custody={:?} day_scope={:?}",
        config.ledger.custody, config.ledger.day_scope
    );

    println!("keyper_core version={}", core_version());
    println!("schema_version={}", current_user_version(&conn)?);
    print_counts(&conn)?;
    Ok(())
}

fn print_counts(conn: &Connection) -> Result<(), Box<dyn Error>> {
    let directory = SqliteDirectoryRepository::try_new(conn)?;
    let schedules = SqliteScheduleRepository::try_new(conn)?;
    let ledger = SqliteLedgerRepository::try_new(conn)?;

    println!("buildings={}", directory.list_buildings()?.len());
    println!("rooms={}", directory.list_rooms()?.len());
    println!("students={}", directory.list_students()?.len());
    println!("instructors={}", directory.list_instructors()?.len());
    println!("schedules={}", schedules.list_schedules()?.len());
    println!("custody_records={}", ledger.list_records()?.len());
    println!("attendance={}", ledger.list_attendance()?.len());
    Ok(())
}
