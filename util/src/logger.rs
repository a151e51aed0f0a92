//! Logging set up for the arm executables
//!
//! Records go to stdout and to the session's log file, tagged with the seconds elapsed since the
//! session epoch. Verbosity is set by a [`LogConfig`]: one default level plus optional levels for
//! individual targets, so for example the arm link's per-chunk tracing can be kept quiet while
//! the dispatcher runs at `trace`.
//!
//! Warnings and errors are never filtered out. Collision refusals, protocol errors and
//! abandoned commands are all reported at `warn`.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External imports
use colored::{ColoredString, Colorize};
use log::{info, Level};
use thiserror::Error;

// Internal imports
use crate::session::{self, Session};

// Re-exports
pub use log::LevelFilter;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Quietest level a target may be set to.
pub const LOG_LEVEL_FLOOR: LevelFilter = LevelFilter::Warn;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Log levels for the default and for individual targets.
#[derive(Debug, Clone, PartialEq)]
pub struct LogConfig {
    default: LevelFilter,

    /// Target prefix and its level, in the order they were added
    targets: Vec<(String, LevelFilter)>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum LoggerInitError {
    #[error("Log level `{level}` for {target} would hide warnings, use `warn` or a more verbose level")]
    LevelBelowFloor { target: String, level: LevelFilter },

    #[error("Cannot open the session log file: {0}")]
    LogFileError(std::io::Error),

    #[error("A logger has already been installed: {0}")]
    AlreadyInitialised(log::SetLoggerError),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl LogConfig {
    pub fn new(default: LevelFilter) -> Result<Self, LoggerInitError> {
        check_floor("the default", default)?;

        Ok(Self {
            default,
            targets: Vec::new(),
        })
    }

    /// Set the level of a target and everything below it in the module tree, e.g.
    /// `comms_if::net` also covers `comms_if::net::sim`. Setting the same target twice keeps the
    /// last level.
    pub fn with_target(mut self, target: &str, level: LevelFilter) -> Result<Self, LoggerInitError> {
        check_floor(target, level)?;

        self.targets.retain(|(t, _)| t != target);
        self.targets.push((target.to_string(), level));

        Ok(self)
    }

    /// Level applying to records from `target`. The most specific configured prefix wins.
    pub fn level_for(&self, target: &str) -> LevelFilter {
        self.targets
            .iter()
            .filter(|(prefix, _)| covers(prefix, target))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, level)| *level)
            .unwrap_or(self.default)
    }

    /// Most verbose level of any target, used as the global cut-off.
    pub fn max_level(&self) -> LevelFilter {
        self.targets
            .iter()
            .map(|(_, level)| *level)
            .fold(self.default, |a, b| a.max(b))
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Install the global logger. Can only succeed once per process.
pub fn logger_init(config: &LogConfig, session: &Session) -> Result<(), LoggerInitError> {
    let log_file = match fern::log_file(&session.log_file_path) {
        Ok(f) => f,
        Err(e) => return Err(LoggerInitError::LogFileError(e)),
    };

    let filter_config = config.clone();

    let result = fern::Dispatch::new()
        .format(|out, message, record| {
            let elapsed = session::get_elapsed_seconds();

            // Debug and trace records say where they came from
            if record.level() > Level::Info {
                out.finish(format_args!(
                    "[{:10.6} {}] {}: {}",
                    elapsed,
                    level_tag(record.level()),
                    record.target(),
                    message
                ))
            } else {
                out.finish(format_args!(
                    "[{:10.6} {}] {}",
                    elapsed,
                    level_tag(record.level()),
                    message
                ))
            }
        })
        .level(config.max_level())
        .filter(move |meta| meta.level() <= filter_config.level_for(meta.target()))
        .chain(std::io::stdout())
        .chain(log_file)
        .apply();

    if let Err(e) = result {
        return Err(LoggerInitError::AlreadyInitialised(e));
    }

    info!("Logging to {:?}", session.log_file_path);
    info!("    Session epoch: {}", session::get_epoch());
    info!("    Default level: {}", config.default);
    for (target, level) in config.targets.iter() {
        info!("    {}: {}", target, level);
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn check_floor(target: &str, level: LevelFilter) -> Result<(), LoggerInitError> {
    if level < LOG_LEVEL_FLOOR {
        Err(LoggerInitError::LevelBelowFloor {
            target: target.to_string(),
            level,
        })
    } else {
        Ok(())
    }
}

/// True if `prefix` is `target` or one of its parent modules.
fn covers(prefix: &str, target: &str) -> bool {
    match target.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with("::"),
        None => false,
    }
}

fn level_tag(level: Level) -> ColoredString {
    match level {
        Level::Trace => "TRC".dimmed().italic(),
        Level::Debug => "DBG".dimmed(),
        Level::Info => "INF".normal(),
        Level::Warn => "WRN".yellow(),
        Level::Error => "ERR".red().bold(),
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
