//! Logging setup plus per-module switchable logging macros.
//!
//! A module opts into the macros by declaring the flag they read:
//! ```ignore
//! const ENABLE_LOGS: bool = true;
//!
//! use crate::{log_debug, log_info, log_warn};
//!
//! log_info!("resolved {} journeys", count);
//! ```
//! Flipping the flag to `false` silences that module without touching
//! `RUST_LOG`, which is handy for the chatty per-row ingest loop.

use log::LevelFilter;

/// Installs `env_logger`. `RUST_LOG` is parsed after the default level, so it
/// still wins for any module it names; `verbosity` only moves the default
/// (0 = info, 1 = debug, 2+ = trace, negative = warn and below).
pub fn init_logging(verbosity: i8) {
    let level = level_for(verbosity);

    // Ignored when a logger is already installed.
    let _ = env_logger::Builder::from_default_env()
        .filter_level(level)
        .parse_default_env()
        .try_init();
}

fn level_for(verbosity: i8) -> LevelFilter {
    match verbosity {
        i8::MIN..=-2 => LevelFilter::Error,
        -1 => LevelFilter::Warn,
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Info log gated on the calling module's `ENABLE_LOGS`.
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::info!($($arg)*);
        }
    };
}

/// Warn log gated on the calling module's `ENABLE_LOGS`.
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::warn!($($arg)*);
        }
    };
}

/// Error log gated on the calling module's `ENABLE_LOGS`.
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::error!($($arg)*);
        }
    };
}

/// Debug log gated on the calling module's `ENABLE_LOGS`.
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::debug!($($arg)*);
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_moves_the_default_level() {
        assert_eq!(level_for(0), LevelFilter::Info);
        assert_eq!(level_for(1), LevelFilter::Debug);
        assert_eq!(level_for(5), LevelFilter::Trace);
        assert_eq!(level_for(-1), LevelFilter::Warn);
        assert_eq!(level_for(-3), LevelFilter::Error);
    }

    #[test]
    fn repeated_init_is_harmless() {
        init_logging(0);
        init_logging(2);
        log::info!("logger installed once");
    }
}
