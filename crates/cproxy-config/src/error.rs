//! Error types for challenge metadata / compose manifest parsing

use std::path::PathBuf;
use thiserror::Error;

/// Errors that cause a single challenge directory to be skipped during
/// discovery. Every variant is recovered locally by the registry — none of
/// these ever propagate out of discovery as a whole.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse YAML in {path}: {source}")]
    Yaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("{path}: public_port {port} out of range [1024, 65535]")]
    PublicPortOutOfRange { path: PathBuf, port: i64 },

    #[error("{path}: internal_port {port} out of range [1, 65535]")]
    InternalPortOutOfRange { path: PathBuf, port: i64 },

    #[error("{path}: compose manifest has no services")]
    NoServices { path: PathBuf },
}

pub type Result<T> = std::result::Result<T, ConfigError>;
