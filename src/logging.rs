//! Tracing setup shared by both binaries
//!
//! Logs go to stderr; stdout is reserved for sample and progress lines.

use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Map a `--log-level` value to a level, `fallback` for anything unknown
pub fn parse_level(log_level: &str, fallback: Level) -> Level {
    match log_level {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => fallback,
    }
}

/// Filter directives enabling `level` for the binary and the library
pub fn filter_directives(bin_target: &str, level: Level) -> String {
    let level = level.as_str().to_lowercase();
    format!("{}={},leakprobe_core={}", bin_target, level, level)
}

/// Install the global subscriber for `bin_target`
pub fn init_tracing(bin_target: &str, log_level: &str, fallback: Level) {
    let level = parse_level(log_level, fallback);
    let filter = EnvFilter::new(filter_directives(bin_target, level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
