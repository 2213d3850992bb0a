//! Logging utilities
//!
//! Provides logging setup and configuration.

use env_logger::Env;

/// Setup logging for the server
///
/// `default_level` applies unless `RUST_LOG` is set.
pub fn setup_logging(default_level: &str) {
    env_logger::Builder::from_env(Env::default().default_filter_or(default_level))
        .format_timestamp_millis()
        .init();
}
