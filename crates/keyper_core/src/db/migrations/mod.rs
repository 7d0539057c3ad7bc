//! Ordered schema steps for the Keyper database.
//!
//! The directory tables come first, schedules reference rooms by name, and
//! the ledgers reference both. `PRAGMA user_version` holds the last applied
//! step.

use crate::db::{DbError, DbResult};
use log::info;
use rusqlite::Connection;

/// `(version, sql)` pairs; versions start at 1 and increase by one.
const STEPS: [(u32, &str); 3] = [
    (1, include_str!("0001_directory.sql")),
    (2, include_str!("0002_schedules.sql")),
    (3, include_str!("0003_ledgers.sql")),
];

/// Schema version this build writes and expects.
pub fn latest_version() -> u32 {
    STEPS[STEPS.len() - 1].0
}

/// Brings the connection's schema up to [`latest_version`] in one
/// transaction and returns how many steps ran.
///
/// A database stamped with a newer version is left untouched and reported
/// as [`DbError::UnsupportedSchemaVersion`].
pub fn apply_migrations(conn: &mut Connection) -> DbResult<usize> {
    let from = current_user_version(conn)?;
    let latest = latest_version();
    if from > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: from,
            latest_supported: latest,
        });
    }

    let pending: Vec<_> = STEPS.iter().filter(|(version, _)| *version > from).collect();
    if pending.is_empty() {
        return Ok(0);
    }

    let tx = conn.transaction()?;
    for (version, sql) in &pending {
        tx.execute_batch(sql)?;
        tx.pragma_update(None, "user_version", version)?;
    }
    tx.commit()?;

    info!(
        "event=db_migrate module=db status=ok from_version={} to_version={} steps={}",
        from,
        latest,
        pending.len()
    );
    Ok(pending.len())
}

/// Reads `PRAGMA user_version` from the connection.
pub fn current_user_version(conn: &Connection) -> DbResult<u32> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
}
