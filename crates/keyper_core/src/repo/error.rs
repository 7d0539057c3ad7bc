//! Repository error type shared by all SQLite repositories.

use crate::db::DbError;
use crate::model::key::KeyId;
use rusqlite::ErrorCode;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::os::raw::c_int;

// Extended result codes from sqlite3.h.
const SQLITE_CONSTRAINT_FOREIGNKEY: c_int = 787;
const SQLITE_CONSTRAINT_PRIMARYKEY: c_int = 1555;
const SQLITE_CONSTRAINT_UNIQUE: c_int = 2067;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for directory, schedule and ledger persistence.
#[derive(Debug)]
pub enum RepoError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// A UNIQUE/PRIMARY KEY constraint rejected the write.
    ///
    /// Carries the `table.column` list reported by SQLite.
    UniqueViolation(String),
    /// A FOREIGN KEY constraint rejected the write or delete.
    ForeignKeyViolation,
    /// Update/delete target does not exist.
    NotFound { entity: &'static str, key: String },
    /// Key status changed between admission read and commit.
    StaleKeyStatus(KeyId),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Required column is missing from expected table.
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// Persisted data cannot be converted to a valid model.
    InvalidData(String),
}

impl RepoError {
    /// Returns whether a unique violation was reported against `table`.
    pub fn is_unique_violation_on(&self, table: &str) -> bool {
        match self {
            Self::UniqueViolation(columns) => columns
                .split(',')
                .any(|column| column.trim().starts_with(&format!("{table}."))),
            _ => false,
        }
    }

    /// Returns whether a unique violation names exactly `table.column`.
    pub fn is_unique_violation_for(&self, table: &str, column: &str) -> bool {
        match self {
            Self::UniqueViolation(columns) => {
                let expected = format!("{table}.{column}");
                columns.split(',').any(|value| value.trim() == expected)
            }
            _ => false,
        }
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::UniqueViolation(columns) => write!(f, "unique constraint failed: {columns}"),
            Self::ForeignKeyViolation => write!(f, "foreign key constraint failed"),
            Self::NotFound { entity, key } => write!(f, "{entity} not found: {key}"),
            Self::StaleKeyStatus(key_id) => {
                write!(f, "key status changed concurrently: {key_id}")
            }
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "repository requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "repository requires column `{column}` in table `{table}`"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        match value {
            DbError::Sqlite(err) => Self::from(err),
            other => Self::Db(other),
        }
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(failure, message) = &value {
            if failure.code == ErrorCode::ConstraintViolation {
                match failure.extended_code {
                    SQLITE_CONSTRAINT_UNIQUE | SQLITE_CONSTRAINT_PRIMARYKEY => {
                        let columns = message
                            .as_deref()
                            .and_then(|text| text.split_once(": "))
                            .map(|(_, columns)| columns.to_string())
                            .unwrap_or_default();
                        return Self::UniqueViolation(columns);
                    }
                    SQLITE_CONSTRAINT_FOREIGNKEY => return Self::ForeignKeyViolation,
                    _ => {}
                }
            }
        }
        Self::Db(DbError::Sqlite(value))
    }
}
