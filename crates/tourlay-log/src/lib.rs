//! Logging setup for tourlay binaries.
//!
//! Installs a `tracing` subscriber with console output and, in debug builds,
//! a JSON log file for post-mortem analysis. `RUST_LOG` wins over the
//! configured level.

use std::path::{Path, PathBuf};

use tourlay_config::Config;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Name of the JSON log file written in debug builds.
pub const LOG_FILE: &str = "tourlay.log";

const DEFAULT_DIRECTIVE: &str = "info";

/// Filter directive from the config's log level, `info` when unset.
pub fn filter_directive(config: Option<&Config>) -> String {
    match config {
        Some(config) if !config.debug.log_level.trim().is_empty() => {
            config.debug.log_level.trim().to_string()
        }
        _ => DEFAULT_DIRECTIVE.to_string(),
    }
}

/// Filter used when `RUST_LOG` is not set.
pub fn default_env_filter() -> EnvFilter {
    EnvFilter::new(DEFAULT_DIRECTIVE)
}

/// Install the global subscriber.
///
/// Returns the path of the JSON log file when one was opened. Does nothing
/// if a subscriber is already installed.
pub fn init_logging(log_dir: Option<&Path>, debug_build: bool, config: Option<&Config>) -> Option<PathBuf> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(config)));

    // Worker threads are named, so thread names identify pool jobs.
    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_names(true)
        .with_level(true)
        .with_timer(fmt::time::uptime());

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer);

    if debug_build
        && let Some(log_dir) = log_dir
        && std::fs::create_dir_all(log_dir).is_ok()
        && let Ok(log_file) = std::fs::File::create(log_dir.join(LOG_FILE))
    {
        let file_layer = fmt::layer()
            .with_writer(log_file)
            .with_ansi(false)
            .with_target(true)
            .with_timer(fmt::time::uptime())
            .json();

        if subscriber.with(file_layer).try_init().is_err() {
            return None;
        }
        let path = log_dir.join(LOG_FILE);
        tracing::debug!("writing JSON log to {}", path.display());
        return Some(path);
    }

    let _ = subscriber.try_init();
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directive_defaults_to_info() {
        assert_eq!(filter_directive(None), "info");
        let mut config = Config::default();
        config.debug.log_level = "  ".into();
        assert_eq!(filter_directive(Some(&config)), "info");
    }

    #[test]
    fn test_directive_from_config() {
        let mut config = Config::default();
        config.debug.log_level = "warn,tourlay_placement=debug".into();
        assert_eq!(filter_directive(Some(&config)), "warn,tourlay_placement=debug");
    }

    #[test]
    fn test_crate_filters_parse() {
        for directive in [
            "info",
            "debug,tourlay_occlusion=trace",
            "warn,tourlay_overlay=debug,tourlay_placement=trace",
        ] {
            assert!(EnvFilter::try_new(directive).is_ok(), "{directive}");
        }
        assert!(format!("{}", default_env_filter()).contains("info"));
    }

    /// Only one test in this binary installs the global subscriber.
    #[test]
    fn test_debug_build_writes_log_file() {
        let dir = tempfile::tempdir().unwrap();
        let logs = dir.path().join("logs");
        let path = init_logging(Some(&logs), true, None);
        assert_eq!(path, Some(logs.join(LOG_FILE)));
        assert!(logs.join(LOG_FILE).exists());
        // A second install is refused without panicking.
        assert_eq!(init_logging(Some(&logs), true, None), None);
    }
}
