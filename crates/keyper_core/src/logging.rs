//! Rolling file logging for the Keyper core.
//!
//! # Responsibility
//! - Start one rolling file logger per process.
//! - Keep ledger events metadata-only: ids, tags and outcomes, never names.
//!
//! # Invariants
//! - Repeating `init_logging` with the same level and directory is a no-op.
//! - A second call with a different level or directory fails instead of
//!   silently reconfiguring.
//! - Nothing in here panics.

use crate::config::CoreConfig;
use crate::db::migrations::latest_version;
use flexi_logger::{
    Cleanup, Criterion, FileSpec, LogSpecification, Logger, LoggerHandle, Naming, WriteMode,
};
use log::{error, info, LevelFilter};
use once_cell::sync::OnceCell;
use std::panic::PanicHookInfo;
use std::path::{Path, PathBuf};

const LOG_FILE_BASENAME: &str = "keyper";
const ROTATE_AT_BYTES: u64 = 10 * 1024 * 1024;
const KEEP_ROTATED_FILES: usize = 5;
const PANIC_SUMMARY_CHARS: usize = 160;

static ACTIVE: OnceCell<ActiveLogger> = OnceCell::new();
static PANIC_HOOK: OnceCell<()> = OnceCell::new();

struct ActiveLogger {
    status: LoggingStatus,
    _handle: LoggerHandle,
}

/// Level and directory of the running file logger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingStatus {
    pub level: LevelFilter,
    pub log_dir: PathBuf,
}

/// Starts file logging at `level` under the absolute directory `log_dir`.
///
/// # Errors
/// - `level` is not one of `trace|debug|info|warn|error`.
/// - `log_dir` is blank, relative, or cannot be created.
/// - A logger is already running with another level or directory.
/// - flexi_logger refuses to start.
pub fn init_logging(level: &str, log_dir: &str) -> Result<(), String> {
    let wanted = LoggingStatus {
        level: parse_level(level)?,
        log_dir: parse_log_dir(log_dir)?,
    };

    let active = match ACTIVE.get() {
        Some(active) => active,
        None => ACTIVE.get_or_try_init(|| start(&wanted))?,
    };
    if active.status == wanted {
        return Ok(());
    }
    Err(format!(
        "logging already running with level {} in `{}`; refusing to switch to level {} in `{}`",
        active.status.level,
        active.status.log_dir.display(),
        wanted.level,
        wanted.log_dir.display()
    ))
}

/// Returns the running logger's settings, or `None` before `init_logging`.
pub fn logging_status() -> Option<LoggingStatus> {
    ACTIVE.get().map(|active| active.status.clone())
}

/// Starts logging from `CoreConfig`.
///
/// Without a configured `log_dir` nothing is started and `Ok(false)` is
/// returned.
pub fn init_logging_from_config(config: &CoreConfig) -> Result<bool, String> {
    let Some(dir) = config.log_dir.as_deref() else {
        return Ok(false);
    };
    let dir = dir
        .to_str()
        .ok_or_else(|| format!("log_dir `{}` is not valid UTF-8", dir.display()))?;
    init_logging(&config.log_level, dir).map(|()| true)
}

/// `debug` for debug builds, `info` for release builds.
pub fn default_log_level() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    }
}

fn start(status: &LoggingStatus) -> Result<ActiveLogger, String> {
    let dir = status.log_dir.as_path();
    std::fs::create_dir_all(dir)
        .map_err(|err| format!("cannot create log directory `{}`: {err}", dir.display()))?;

    let spec = LogSpecification::builder().default(status.level).build();
    let handle = Logger::with(spec)
        .log_to_file(FileSpec::default().directory(dir).basename(LOG_FILE_BASENAME))
        .rotate(
            Criterion::Size(ROTATE_AT_BYTES),
            Naming::Numbers,
            Cleanup::KeepLogFiles(KEEP_ROTATED_FILES),
        )
        .write_mode(WriteMode::BufferAndFlush)
        .append()
        .format_for_files(flexi_logger::detailed_format)
        .start()
        .map_err(|err| format!("cannot start file logger: {err}"))?;

    PANIC_HOOK.get_or_init(install_panic_hook);

    info!(
        "event=keyper_start module=core status=ok version={} schema_version={} os={} debug_build={}",
        env!("CARGO_PKG_VERSION"),
        latest_version(),
        std::env::consts::OS,
        cfg!(debug_assertions)
    );
    info!(
        "event=logging_init module=core status=ok level={} log_dir={}",
        status.level,
        dir.display()
    );

    Ok(ActiveLogger {
        status: status.clone(),
        _handle: handle,
    })
}

fn parse_level(level: &str) -> Result<LevelFilter, String> {
    let level = level.trim().to_ascii_lowercase();
    let filter = match level.as_str() {
        "trace" => LevelFilter::Trace,
        "debug" => LevelFilter::Debug,
        "info" => LevelFilter::Info,
        "warn" | "warning" => LevelFilter::Warn,
        "error" => LevelFilter::Error,
        _ => {
            return Err(format!(
                "unsupported log level `{level}`; expected trace|debug|info|warn|error"
            ))
        }
    };
    Ok(filter)
}

fn parse_log_dir(log_dir: &str) -> Result<PathBuf, String> {
    let path = Path::new(log_dir.trim());
    if path.as_os_str().is_empty() {
        return Err("log_dir cannot be empty".to_string());
    }
    if path.is_relative() {
        return Err(format!(
            "log_dir must be an absolute path, got `{}`",
            path.display()
        ));
    }
    Ok(path.to_path_buf())
}

fn install_panic_hook() {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let location = info
            .location()
            .map_or_else(|| "unknown".to_string(), |at| format!("{}:{}", at.file(), at.line()));
        error!(
            "event=panic_captured module=core status=error location={} payload={}",
            location,
            panic_summary(info)
        );
        previous(info);
    }));
}

// Panic payloads can carry card tags or student names.
fn panic_summary(info: &PanicHookInfo<'_>) -> String {
    let payload = info.payload();
    let text = payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload");
    single_line(text, PANIC_SUMMARY_CHARS)
}

fn single_line(value: &str, max_chars: usize) -> String {
    let mut out: String = value
        .chars()
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .take(max_chars)
        .collect();
    if value.chars().nth(max_chars).is_some() {
        out.push_str("...");
    }
    out
}
