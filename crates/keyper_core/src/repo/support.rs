//! SQLite helpers shared by repository implementations.

use super::{RepoError, RepoResult};
use crate::db::migrations::{current_user_version, latest_version};
use rusqlite::{Connection, Params, Row};
use std::collections::HashSet;
use uuid::Uuid;

/// Table name plus the columns a repository reads or writes.
pub(crate) type TableShape = (&'static str, &'static [&'static str]);

/// Checks that `conn` is migrated to the current schema and carries every
/// table and column in `shapes`.
pub(crate) fn ensure_connection_ready(conn: &Connection, shapes: &[TableShape]) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version = current_user_version(conn)?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for &(table, columns) in shapes {
        let present = column_names(conn, table)?;
        if present.is_empty() {
            return Err(RepoError::MissingRequiredTable(table));
        }
        if let Some(&column) = columns.iter().find(|column| !present.contains(**column)) {
            return Err(RepoError::MissingRequiredColumn { table, column });
        }
    }

    Ok(())
}

// Empty for a table that does not exist.
fn column_names(conn: &Connection, table: &str) -> RepoResult<HashSet<String>> {
    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?1);")?;
    let names = stmt
        .query_map([table], |row| row.get(0))?
        .collect::<Result<_, _>>()?;
    Ok(names)
}

/// Runs `sql` and parses the first row, if any.
pub(crate) fn query_optional<T, P: Params>(
    conn: &Connection,
    sql: &str,
    params: P,
    parse: fn(&Row<'_>) -> RepoResult<T>,
) -> RepoResult<Option<T>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params)?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse(row)?));
    }
    Ok(None)
}

/// Runs `sql` and parses every row in result order.
pub(crate) fn query_all<T, P: Params>(
    conn: &Connection,
    sql: &str,
    params: P,
    parse: fn(&Row<'_>) -> RepoResult<T>,
) -> RepoResult<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params)?;
    let mut items = Vec::new();
    while let Some(row) = rows.next()? {
        items.push(parse(row)?);
    }
    Ok(items)
}

/// Reads a UUID text column, rejecting malformed values.
pub(crate) fn get_uuid(row: &Row<'_>, column: &'static str) -> RepoResult<Uuid> {
    let value: String = row.get(column)?;
    Uuid::parse_str(&value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid `{value}` in column {column}")))
}

/// Maps a zero-row update/delete to `NotFound`.
pub(crate) fn require_changed(
    changed: usize,
    entity: &'static str,
    key: impl ToString,
) -> RepoResult<()> {
    if changed == 0 {
        return Err(RepoError::NotFound {
            entity,
            key: key.to_string(),
        });
    }
    Ok(())
}
