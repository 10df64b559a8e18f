//! Container driver for the challenge proxy
//!
//! Thin typed wrapper over the compose orchestrator and the container
//! inspector CLIs. No state is held here: every call is a fresh subprocess
//! invocation, and the runtime (not this crate) is the source of truth.

mod cli_driver;
mod error;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use cli_driver::CliComposeDriver;
pub use error::*;

use async_trait::async_trait;
use std::net::IpAddr;
use std::path::Path;

/// Lifecycle and discovery operations backed by the compose/inspect CLIs.
///
/// Every method is non-blocking from the caller's point of view: the
/// implementation awaits subprocess completion cooperatively, so no call
/// should be made from a context where blocking the executor would matter.
#[async_trait]
pub trait ComposeDriver: Send + Sync {
    /// List container ids currently known for `service_name` in the compose
    /// project at `compose_path`. Empty, not an error, if none are running.
    async fn list_container_ids(
        &self,
        compose_path: &Path,
        work_dir: &Path,
        service_name: &str,
    ) -> Result<Vec<String>>;

    /// Resolve a container's network address. `Ok(None)` covers both "no such
    /// container" and "parse failure" — both are reported the same way to
    /// callers, per the driver's contract that parse errors are not faults.
    async fn inspect_container(&self, container_id: &str) -> Result<Option<IpAddr>>;

    /// Bring up every service declared in the compose manifest. Idempotent:
    /// calling this against an already-running project is a runtime no-op.
    async fn bring_up(&self, compose_path: &Path, work_dir: &Path) -> Result<bool>;
}
