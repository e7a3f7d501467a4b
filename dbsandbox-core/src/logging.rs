//! Logging setup for the `dbsandbox` binary.
//!
//! Library code only emits `tracing` events; installing a subscriber is
//! left to the outermost entry point.

use crate::{Result, error::SandboxError};
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing::Level;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{Layer, fmt};

/// Console level for a verbosity count.
pub fn console_level(verbose: u8, quiet: bool) -> Level {
    match (quiet, verbose) {
        (true, _) => Level::ERROR,
        (false, 0) => Level::INFO,
        (false, 1) => Level::DEBUG,
        (false, _) => Level::TRACE,
    }
}

/// Log file level: never less detailed than DEBUG.
pub fn file_level(console: Level) -> Level {
    if console == Level::TRACE {
        Level::TRACE
    } else {
        Level::DEBUG
    }
}

/// Initializes structured logging based on verbosity level.
///
/// # Arguments
/// * `verbose` - Verbosity level (0=INFO, 1=DEBUG, 2+=TRACE)
/// * `quiet` - If true, only show ERROR level logs on the console
/// * `log_file` - Optional file receiving a copy of the log without ANSI
///   colors, at DEBUG or more detailed
///
/// # Example
/// ```rust,no_run
/// use dbsandbox_core::logging::init_logging;
///
/// init_logging(1, false, None).expect("Failed to initialize logging");
/// ```
///
/// # Errors
/// Returns an I/O error if the log file cannot be opened, or a configuration
/// error if a global subscriber is already installed
pub fn init_logging(verbose: u8, quiet: bool, log_file: Option<&Path>) -> Result<()> {
    let level = console_level(verbose, quiet);

    let console = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_filter(LevelFilter::from_level(level));

    let file = match log_file {
        Some(path) => {
            let handle = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| SandboxError::Io {
                    context: format!("Failed to open log file {}", path.display()),
                    source: e,
                })?;
            Some(
                fmt::layer()
                    .with_writer(Mutex::new(handle))
                    .with_ansi(false)
                    .with_filter(LevelFilter::from_level(file_level(level))),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .try_init()
        .map_err(|e| {
            SandboxError::configuration(format!("Failed to initialize logging: {e}"))
        })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    // A global subscriber can only be installed once per process, so only
    // the level selection is tested here.

    #[test]
    fn test_verbosity_levels() {
        let test_cases = [
            ((true, 0), Level::ERROR),
            ((true, 5), Level::ERROR),
            ((false, 0), Level::INFO),
            ((false, 1), Level::DEBUG),
            ((false, 2), Level::TRACE),
            ((false, 10), Level::TRACE),
        ];

        for ((quiet, verbose), expected) in test_cases {
            assert_eq!(
                console_level(verbose, quiet),
                expected,
                "Failed for quiet={quiet}, verbose={verbose}"
            );
        }
    }

    #[test]
    fn test_file_level_is_at_least_debug() {
        assert_eq!(file_level(Level::ERROR), Level::DEBUG);
        assert_eq!(file_level(Level::INFO), Level::DEBUG);
        assert_eq!(file_level(Level::TRACE), Level::TRACE);
    }
}
