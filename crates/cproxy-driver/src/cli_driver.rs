//! CLI-based compose driver
//!
//! Uses `docker-compose` and `docker inspect` directly instead of a client
//! library so the orchestrator of record is whatever the operator has on
//! `PATH` — no daemon API version skew to track.

use crate::{ComposeDriver, DriverError, Result};
use async_trait::async_trait;
use std::net::IpAddr;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

/// Compose driver that shells out to `docker-compose` and `docker`.
pub struct CliComposeDriver;

impl CliComposeDriver {
    pub fn new() -> Self {
        Self
    }

    /// Run a command, capturing stdout; stderr is logged on failure but never
    /// surfaced to the caller (§4.1: "Captured stderr is attached to log
    /// records on failure; it is not exposed in return values").
    async fn run_cmd(&self, program: &'static str, args: &[&str], cwd: Option<&Path>) -> Result<(bool, String)> {
        let mut cmd = Command::new(program);
        cmd.args(args);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let output = cmd
            .output()
            .await
            .map_err(|e| DriverError::Spawn(program, e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::debug!(program, args = ?args, status = ?output.status, stderr = %stderr.trim(), "command exited non-zero");
        }

        Ok((
            output.status.success(),
            String::from_utf8_lossy(&output.stdout).to_string(),
        ))
    }
}

impl Default for CliComposeDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ComposeDriver for CliComposeDriver {
    async fn list_container_ids(
        &self,
        compose_path: &Path,
        work_dir: &Path,
        service_name: &str,
    ) -> Result<Vec<String>> {
        let compose_path_str = compose_path.to_string_lossy().to_string();
        let (_success, stdout) = self
            .run_cmd(
                "docker-compose",
                &["-f", &compose_path_str, "ps", "-q", service_name],
                Some(work_dir),
            )
            .await?;

        Ok(stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    async fn inspect_container(&self, container_id: &str) -> Result<Option<IpAddr>> {
        let (success, stdout) = self
            .run_cmd("docker", &["inspect", container_id], None)
            .await?;

        if !success || stdout.trim().is_empty() {
            return Ok(None);
        }

        Ok(parse_inspect_ip(&stdout))
    }

    async fn bring_up(&self, compose_path: &Path, work_dir: &Path) -> Result<bool> {
        let compose_path_str = compose_path.to_string_lossy().to_string();
        let (success, _stdout) = self
            .run_cmd(
                "docker-compose",
                &[
                    "-f",
                    &compose_path_str,
                    "up",
                    "--build",
                    "-d",
                    "--remove-orphans",
                ],
                Some(work_dir),
            )
            .await?;

        Ok(success)
    }
}

/// Parse `docker inspect <id>` JSON and pick an IP by priority:
/// a bridge/default-named network first, then any network with a non-empty
/// address, then nothing. Malformed JSON is treated as "no IP", not a fault.
fn parse_inspect_ip(raw: &str) -> Option<IpAddr> {
    let parsed: Vec<serde_json::Value> = serde_json::from_str(raw).ok()?;
    let entry = parsed.first()?;
    let networks = entry
        .get("NetworkSettings")?
        .get("Networks")?
        .as_object()?;

    let mut fallback: Option<IpAddr> = None;
    for (name, settings) in networks {
        let ip_str = settings.get("IPAddress").and_then(|v| v.as_str());
        let Some(ip_str) = ip_str else { continue };
        if ip_str.is_empty() {
            continue;
        }
        let Ok(ip) = ip_str.parse::<IpAddr>() else {
            continue;
        };

        let lower = name.to_ascii_lowercase();
        if lower.contains("bridge") || lower.contains("default") {
            return Some(ip);
        }
        if fallback.is_none() {
            fallback = Some(ip);
        }
    }

    fallback
}
