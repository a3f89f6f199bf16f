//! Logger initialisation for the roof driver binary.

use log::LevelFilter;

/// Translate the configured level name; unknown names fall back to info.
pub fn level_filter(log_level: &str) -> LevelFilter {
    match log_level.to_ascii_lowercase().as_str() {
        "trace" => LevelFilter::Trace,
        "debug" => LevelFilter::Debug,
        "info" => LevelFilter::Info,
        "warn" => LevelFilter::Warn,
        "error" => LevelFilter::Error,
        "off" => LevelFilter::Off,
        _ => LevelFilter::Info,
    }
}

/// Initialise the global logger once.
///
/// `RUST_LOG`, when set, takes precedence over the configured level.
pub fn init_logger(log_level: &str) {
    let mut builder = pretty_env_logger::formatted_timed_builder();
    builder.filter_level(level_filter(log_level));
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    if builder.try_init().is_err() {
        log::warn!("Logger already initialised.");
    }
}
