//! Command-line arguments for the tourlay runner.

use std::path::PathBuf;

use clap::Parser;

use crate::{BusyPolicy, Config};

/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug, Default)]
#[command(name = "tourlay", about = "Place and optimize overlay anchors for tour sites")]
pub struct CliArgs {
    /// Scenario file (RON) to run.
    #[arg(long)]
    pub scenario: Option<PathBuf>,

    /// Worker threads (0 = one per spare core).
    #[arg(long)]
    pub threads: Option<usize>,

    /// Job queue capacity.
    #[arg(long)]
    pub queue_capacity: Option<usize>,

    /// Solve deadline in milliseconds (0 = no deadline).
    #[arg(long)]
    pub solve_timeout_ms: Option<u64>,

    /// What to do when a site is being re-optimized (queue or reject).
    #[arg(long)]
    pub site_busy_policy: Option<BusyPolicy>,

    /// LOD tiers generated when an overlay does not ask for a count.
    #[arg(long)]
    pub lod_levels: Option<u8>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(threads) = args.threads {
            self.workers.threads = threads;
        }
        if let Some(capacity) = args.queue_capacity {
            self.workers.queue_capacity = capacity;
        }
        if let Some(ms) = args.solve_timeout_ms {
            self.coordinator.solve_timeout_ms = ms;
        }
        if let Some(policy) = args.site_busy_policy {
            self.coordinator.site_busy_policy = policy;
        }
        if let Some(levels) = args.lod_levels {
            self.lod.default_levels = levels;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_override() {
        let mut config = Config::default();
        let args = CliArgs {
            threads: Some(3),
            site_busy_policy: Some(BusyPolicy::Reject),
            log_level: Some("debug".into()),
            ..Default::default()
        };
        config.apply_cli_overrides(&args);
        assert_eq!(config.workers.threads, 3);
        assert_eq!(config.coordinator.site_busy_policy, BusyPolicy::Reject);
        assert_eq!(config.debug.log_level, "debug");
        // Non-overridden fields retain defaults
        assert_eq!(config.workers.queue_capacity, 64);
        assert_eq!(config.lod.default_levels, 3);
    }

    #[test]
    fn test_cli_no_override() {
        let mut config = Config::default();
        config.apply_cli_overrides(&CliArgs::default());
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_parse_flags() {
        let args = CliArgs::parse_from([
            "tourlay",
            "--scenario",
            "abbey.ron",
            "--site-busy-policy",
            "reject",
            "--solve-timeout-ms",
            "250",
        ]);
        assert_eq!(args.scenario, Some(PathBuf::from("abbey.ron")));
        assert_eq!(args.site_busy_policy, Some(BusyPolicy::Reject));
        assert_eq!(args.solve_timeout_ms, Some(250));
        assert!(args.threads.is_none());
    }
}
