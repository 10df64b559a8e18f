//! Core logic for the challenge proxy
//!
//! This crate provides:
//! - Challenge discovery and the immutable registry it produces
//! - The readiness engine (probe / ensure_ready)
//! - The per-connection handler (ready-gating, dialing, bidirectional streaming)
//! - The supervisor / listener fleet that ties them together

mod error;
pub mod handler;
pub mod readiness;
pub mod registry;
pub mod supervisor;

pub use error::*;
pub use registry::{ChallengeDescriptor, ChallengeRegistry, ServiceState};
