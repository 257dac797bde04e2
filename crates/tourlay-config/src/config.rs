//! Runner settings with defaults and RON persistence.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const CONFIG_FILE: &str = "config.ron";

/// Most LOD tiers an overlay can carry.
const MAX_LOD_LEVELS: u8 = 5;

/// `dirs::config_dir()/tourlay`, or `./tourlay` where the platform has no
/// config directory.
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tourlay")
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub workers: WorkerConfig,
    pub coordinator: CoordinatorConfig,
    pub lod: LodConfig,
    pub debug: DebugConfig,
}

/// Solver worker pool sizing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorkerConfig {
    /// Worker threads; 0 sizes the pool from the CPU count.
    pub threads: usize,
    /// Jobs that may wait in the queue before submissions are refused.
    pub queue_capacity: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            threads: 0,
            queue_capacity: 64,
        }
    }
}

/// Behavior when a request meets a site under batch re-optimization.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BusyPolicy {
    #[default]
    Queue,
    Reject,
}

impl std::str::FromStr for BusyPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queue" => Ok(BusyPolicy::Queue),
            "reject" => Ok(BusyPolicy::Reject),
            other => Err(format!("unknown site busy policy '{other}', expected queue or reject")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Deadline for a single solve in milliseconds; 0 waits indefinitely.
    pub solve_timeout_ms: u64,
    pub site_busy_policy: BusyPolicy,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            solve_timeout_ms: 5_000,
            site_busy_policy: BusyPolicy::Queue,
        }
    }
}

impl CoordinatorConfig {
    pub fn solve_timeout(&self) -> Option<Duration> {
        (self.solve_timeout_ms > 0).then(|| Duration::from_millis(self.solve_timeout_ms))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LodConfig {
    /// Tiers generated for overlays that do not request a count.
    pub default_levels: u8,
}

impl Default for LodConfig {
    fn default() -> Self {
        Self { default_levels: 3 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
    /// Where debug builds write `tourlay.log`; `logs/` under the config
    /// directory when unset.
    pub log_dir: Option<PathBuf>,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_dir: None,
        }
    }
}

impl Config {
    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE);

        if config_path.exists() {
            let config = Self::read(&config_path)?;
            log::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Write the config to `config_dir/config.ron`, creating the directory.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(|source| ConfigError::Write {
            path: config_dir.to_path_buf(),
            source,
        })?;

        let config_path = config_dir.join(CONFIG_FILE);
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .enumerate_arrays(false);
        let serialized = ron::ser::to_string_pretty(self, pretty)?;

        std::fs::write(&config_path, serialized).map_err(|source| ConfigError::Write {
            path: config_path,
            source,
        })
    }

    /// Re-read the file: `Some(new_config)` if it differs from `self`.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let new_config = Self::read(&config_dir.join(CONFIG_FILE))?;
        if &new_config != self {
            log::info!("Config reloaded with changes");
            Ok(Some(new_config))
        } else {
            Ok(None)
        }
    }

    /// Reject values the coordinator cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers.queue_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "workers.queue_capacity",
                reason: "must be at least 1".into(),
            });
        }
        if !(1..=MAX_LOD_LEVELS).contains(&self.lod.default_levels) {
            return Err(ConfigError::Invalid {
                field: "lod.default_levels",
                reason: format!("must be between 1 and {MAX_LOD_LEVELS}"),
            });
        }
        Ok(())
    }

    /// Directory for the debug log file.
    pub fn log_dir(&self, config_dir: &Path) -> PathBuf {
        self.debug
            .log_dir
            .clone()
            .unwrap_or_else(|| config_dir.join("logs"))
    }

    fn read(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(ron::from_str(&contents)?)
    }
}
