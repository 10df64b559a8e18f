//! Error types for the container driver

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DriverError {
    /// The compose or inspect process could not be launched at all
    #[error("failed to launch {0}: {1}")]
    Spawn(&'static str, std::io::Error),
}

pub type Result<T> = std::result::Result<T, DriverError>;
