//! Opening ready-to-use Keyper connections.
//!
//! Every connection handed out has `foreign_keys=ON`, a busy timeout so
//! concurrent writers on one file wait instead of failing fast, and the
//! schema at [`latest_version`](super::migrations::latest_version).

use super::migrations::apply_migrations;
use super::DbResult;
use log::{error, info};
use rusqlite::Connection;
use std::path::Path;
use std::time::{Duration, Instant};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens (creating if needed) the database file at `path` and migrates it.
pub fn open_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    let path = path.as_ref();
    logged_open("file", || prepare(Connection::open(path)?))
}

/// Opens a fresh, private in-memory database and migrates it.
pub fn open_db_in_memory() -> DbResult<Connection> {
    logged_open("memory", || prepare(Connection::open_in_memory()?))
}

fn prepare(mut conn: Connection) -> DbResult<Connection> {
    conn.pragma_update(None, "foreign_keys", true)?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    apply_migrations(&mut conn)?;
    Ok(conn)
}

fn logged_open(
    mode: &'static str,
    open: impl FnOnce() -> DbResult<Connection>,
) -> DbResult<Connection> {
    let started = Instant::now();
    let outcome = open();
    let elapsed_ms = started.elapsed().as_millis();
    match &outcome {
        Ok(_) => info!("event=db_open module=db status=ok mode={mode} duration_ms={elapsed_ms}"),
        Err(err) => error!(
            "event=db_open module=db status=error mode={mode} duration_ms={elapsed_ms} error={err}"
        ),
    }
    outcome
}
