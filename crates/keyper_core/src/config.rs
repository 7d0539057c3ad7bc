//! Runtime configuration for the Keyper core.
//!
//! # Responsibility
//! - Carry storage, logging and ledger policy settings.
//! - Load overrides from `KEYPER_*` environment variables.
//!
//! # Invariants
//! - Defaults reproduce the reference ledger behavior: total custody
//!   transitions and day-agnostic schedule matching.

use crate::logging::default_log_level;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::str::FromStr;

pub const ENV_DB_PATH: &str = "KEYPER_DB_PATH";
pub const ENV_LOG_LEVEL: &str = "KEYPER_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "KEYPER_LOG_DIR";
pub const ENV_CUSTODY_POLICY: &str = "KEYPER_CUSTODY_POLICY";
pub const ENV_DAY_SCOPE: &str = "KEYPER_DAY_SCOPE";

/// How the record ledger treats redundant borrow/return events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustodyPolicy {
    /// Every event is admitted and re-applied (borrow twice stays borrowed).
    #[default]
    Total,
    /// Redundant or out-of-service transitions are rejected.
    Strict,
}

/// Whether schedule matching considers the schedule's day label.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayScope {
    /// Match on room and time window only.
    #[default]
    Ignore,
    /// Also require the day label to name the instant's weekday.
    Enforce,
}

/// Ledger admission policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerPolicy {
    #[serde(default)]
    pub custody: CustodyPolicy,
    #[serde(default)]
    pub day_scope: DayScope,
}

/// Top-level core configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreConfig {
    /// SQLite file path; `None` opens an in-memory database.
    #[serde(default)]
    pub db_path: Option<PathBuf>,
    #[serde(default = "default_level_string")]
    pub log_level: String,
    /// Absolute directory for rolling log files; `None` disables file logging.
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
    #[serde(default)]
    pub ledger: LedgerPolicy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidValue { field: &'static str, value: String },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { field, value } => {
                write!(f, "invalid value `{value}` for {field}")
            }
        }
    }
}

impl Error for ConfigError {}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            log_level: default_level_string(),
            log_dir: None,
            ledger: LedgerPolicy::default(),
        }
    }
}

impl CoreConfig {
    /// Builds configuration from defaults plus `KEYPER_*` environment values.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let non_blank = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(path) = non_blank(ENV_DB_PATH) {
            config.db_path = Some(PathBuf::from(path.trim()));
        }
        if let Some(level) = non_blank(ENV_LOG_LEVEL) {
            config.log_level = level.trim().to_ascii_lowercase();
        }
        if let Some(dir) = non_blank(ENV_LOG_DIR) {
            config.log_dir = Some(PathBuf::from(dir.trim()));
        }
        if let Some(value) = non_blank(ENV_CUSTODY_POLICY) {
            config.ledger.custody = value.parse()?;
        }
        if let Some(value) = non_blank(ENV_DAY_SCOPE) {
            config.ledger.day_scope = value.parse()?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => {
                return Err(ConfigError::InvalidValue {
                    field: "log_level",
                    value: other.to_string(),
                })
            }
        }
        if let Some(dir) = &self.log_dir {
            if !dir.is_absolute() {
                return Err(ConfigError::InvalidValue {
                    field: "log_dir",
                    value: dir.display().to_string(),
                });
            }
        }
        Ok(())
    }
}

impl FromStr for CustodyPolicy {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "total" => Ok(Self::Total),
            "strict" => Ok(Self::Strict),
            other => Err(ConfigError::InvalidValue {
                field: "custody_policy",
                value: other.to_string(),
            }),
        }
    }
}

impl FromStr for DayScope {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "ignore" => Ok(Self::Ignore),
            "enforce" => Ok(Self::Enforce),
            other => Err(ConfigError::InvalidValue {
                field: "day_scope",
                value: other.to_string(),
            }),
        }
    }
}

fn default_level_string() -> String {
    default_log_level().to_string()
}
