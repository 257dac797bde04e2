use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config: {0}")]
    Parse(#[from] ron::error::SpannedError),

    #[error("cannot serialize config: {0}")]
    Serialize(#[from] ron::Error),

    /// A setting parsed but is outside its allowed range.
    #[error("{field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}
