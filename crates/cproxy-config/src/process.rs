//! Process-wide configuration, read once from the environment at startup.

use std::path::PathBuf;

/// Default challenge root, matching the reference deployment layout.
const DEFAULT_CHALLENGES_ROOT: &str = "/app/challenges";

/// Default log verbosity when `LOG_LEVEL` is unset.
const DEFAULT_LOG_LEVEL: &str = "INFO";

/// Process-wide settings. There is no config file — everything here is an
/// environment override of a hardcoded default, the same shape as the
/// socket-path defaults in a typical provider config, just without a TOML
/// layer on top since this proxy has nothing else worth persisting.
#[derive(Debug, Clone)]
pub struct CProxyConfig {
    /// Root directory scanned once at startup for challenge directories.
    pub challenges_root: PathBuf,
    /// Value of `LOG_LEVEL`, passed through to the tracing `EnvFilter`.
    pub log_level: String,
}

impl CProxyConfig {
    /// Build configuration from the process environment.
    pub fn from_env() -> Self {
        let challenges_root = std::env::var("CHALLENGES_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CHALLENGES_ROOT));

        let log_level =
            std::env::var("LOG_LEVEL").unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string());

        tracing::debug!(
            challenges_root = %challenges_root.display(),
            log_level = %log_level,
            "resolved process configuration"
        );

        Self {
            challenges_root,
            log_level,
        }
    }
}

impl Default for CProxyConfig {
    fn default() -> Self {
        Self {
            challenges_root: PathBuf::from(DEFAULT_CHALLENGES_ROOT),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}
