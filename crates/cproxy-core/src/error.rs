//! Error types for cproxy-core

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("driver error: {0}")]
    Driver(#[from] cproxy_driver::DriverError),

    #[error("failed to bind public port {port}: {source}")]
    Bind {
        port: u16,
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, CoreError>;
