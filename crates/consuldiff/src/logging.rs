//! Logging initialization.

use consuldiff_util::{log, LogConfig, LogLevel};
use std::io::IsTerminal;

/// Log to stdout, at debug level when `verbose`. Colors only on a terminal.
pub fn init_logging(verbose: bool) {
    let level = if verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    log::init(LogConfig {
        level,
        include_location: verbose,
        ansi: std::io::stdout().is_terminal(),
    });
}
