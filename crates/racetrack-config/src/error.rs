//! Configuration errors.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("malformed TOML in {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// A key holds a value the detector cannot run with.
    #[error("invalid {key}: {reason}")]
    ValidationError { key: &'static str, reason: String },

    #[error("no home directory to place user configuration in")]
    NoHomeDirectory,
}

impl ConfigError {
    pub(crate) fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::ValidationError {
            key,
            reason: reason.into(),
        }
    }
}
