//! Configuration parsing for cproxy
//!
//! This crate handles parsing of:
//! - `challenge.yaml` / `challenge.yml` challenge metadata
//! - `docker-compose.yml` / `.yaml` manifests (services + expose lists only)
//! - process-wide configuration (challenge root directory, log level)

mod challenge;
mod compose;
mod error;
mod process;

pub use challenge::*;
pub use compose::*;
pub use error::*;
pub use process::*;
