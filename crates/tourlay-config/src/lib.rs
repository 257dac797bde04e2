//! Configuration for the tourlay runner.
//!
//! Settings persist to disk as `config.ron` and can be overridden from the
//! command line. Unknown fields are ignored and missing ones take their
//! defaults, so config files survive upgrades in both directions.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{
    BusyPolicy, Config, CoordinatorConfig, DebugConfig, LodConfig, WorkerConfig,
    default_config_dir,
};
pub use error::ConfigError;
