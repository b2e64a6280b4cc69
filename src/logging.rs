// CLASSIFICATION: COMMUNITY
// Filename: logging.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-19

//! Diagnostic logging for the shim.
//!
//! The shim lives inside a host application, so it only installs
//! `env_logger` when nothing else has claimed the `log` facade.

use env_logger::Env;
use log::LevelFilter;

/// Level used when `RUST_LOG` is unset.
pub fn default_level(debug: bool) -> LevelFilter {
    if debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    }
}

/// Install the logger. Later calls and pre-existing loggers win silently.
pub fn init(debug: bool) {
    let mut builder =
        env_logger::Builder::from_env(Env::default().default_filter_or(default_level(debug).as_str()));
    builder.format_timestamp_millis();
    let _ = builder.try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_toggle_selects_level() {
        assert_eq!(default_level(true), LevelFilter::Debug);
        assert_eq!(default_level(false), LevelFilter::Warn);
    }

    #[test]
    fn init_twice_is_harmless() {
        init(false);
        init(true);
        log::debug!("logger initialised twice");
    }
}
