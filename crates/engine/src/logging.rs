//! Log subscriber setup
//!
//! Library code only emits `tracing` events; nothing is printed unless the
//! host installs a subscriber. `init_logging` installs a stderr `fmt`
//! subscriber for hosts that do not have one of their own.
//!
//! The level comes from `REGREST_LOG_LEVEL` (`DEBUG`, `INFO`, `WARNING`,
//! `ERROR`, `CRITICAL`; unknown values mean `INFO`). If `RUST_LOG` is set it
//! takes over completely.

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Environment variable selecting the regrest log level
pub const LOG_LEVEL_ENV: &str = "REGREST_LOG_LEVEL";

/// Level used when `REGREST_LOG_LEVEL` is unset or unrecognized
pub const DEFAULT_LOG_LEVEL: LevelFilter = LevelFilter::INFO;

/// Parse a `REGREST_LOG_LEVEL` value
///
/// `CRITICAL` has no tracing counterpart and maps to `ERROR`.
pub fn parse_level(value: &str) -> LevelFilter {
    match value.trim().to_ascii_uppercase().as_str() {
        "DEBUG" => LevelFilter::DEBUG,
        "INFO" => LevelFilter::INFO,
        "WARNING" | "WARN" => LevelFilter::WARN,
        "ERROR" | "CRITICAL" => LevelFilter::ERROR,
        _ => DEFAULT_LOG_LEVEL,
    }
}

/// Filter for regrest targets at the configured level
pub fn level_filter() -> EnvFilter {
    if std::env::var_os(EnvFilter::DEFAULT_ENV).is_some() {
        return EnvFilter::from_default_env();
    }
    let level = std::env::var(LOG_LEVEL_ENV)
        .map(|value| parse_level(&value))
        .unwrap_or(DEFAULT_LOG_LEVEL);
    EnvFilter::new(format!("regrest={}", level))
}

/// Install a stderr subscriber
///
/// Returns `false` if a global subscriber was already installed.
pub fn init_logging() -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(level_filter())
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .is_ok()
}
