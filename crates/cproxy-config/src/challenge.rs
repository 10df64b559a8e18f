//! `challenge.yaml` / `challenge.yml` metadata parsing

use crate::{ConfigError, Result};
use serde::Deserialize;
use std::path::Path;

/// Raw challenge metadata as declared on disk, before range validation.
#[derive(Debug, Clone, Deserialize)]
pub struct ChallengeMetadata {
    pub public_port: i64,
    pub internal_port: i64,
    #[serde(default)]
    pub service_name: Option<String>,
}

impl ChallengeMetadata {
    /// Load and range-validate metadata from `path`. Neither field's range
    /// check has a side effect beyond returning an error — the caller
    /// decides whether to skip the directory.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;

        let metadata: Self = serde_yaml::from_str(&content).map_err(|e| ConfigError::Yaml {
            path: path.to_path_buf(),
            source: e,
        })?;

        if !(1024..=65535).contains(&metadata.public_port) {
            return Err(ConfigError::PublicPortOutOfRange {
                path: path.to_path_buf(),
                port: metadata.public_port,
            });
        }
        if !(1..=65535).contains(&metadata.internal_port) {
            return Err(ConfigError::InternalPortOutOfRange {
                path: path.to_path_buf(),
                port: metadata.internal_port,
            });
        }

        Ok(metadata)
    }

    /// Locate `challenge.yaml` then `challenge.yml` inside `dir`, per the
    /// preference order in the layout spec.
    pub fn find_in(dir: &Path) -> Option<std::path::PathBuf> {
        let yaml = dir.join("challenge.yaml");
        if yaml.is_file() {
            return Some(yaml);
        }
        let yml = dir.join("challenge.yml");
        if yml.is_file() {
            return Some(yml);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_tmp(content: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    #[test]
    fn parses_valid_metadata() {
        let f = write_tmp("public_port: 5000\ninternal_port: 80\nservice_name: web\n");
        let m = ChallengeMetadata::load(f.path()).unwrap();
        assert_eq!(m.public_port, 5000);
        assert_eq!(m.internal_port, 80);
        assert_eq!(m.service_name.as_deref(), Some("web"));
    }

    #[test]
    fn service_name_is_optional() {
        let f = write_tmp("public_port: 5000\ninternal_port: 80\n");
        let m = ChallengeMetadata::load(f.path()).unwrap();
        assert_eq!(m.service_name, None);
    }

    #[test]
    fn rejects_public_port_out_of_range() {
        let f = write_tmp("public_port: 80\ninternal_port: 80\n");
        assert!(matches!(
            ChallengeMetadata::load(f.path()),
            Err(ConfigError::PublicPortOutOfRange { .. })
        ));
    }

    #[test]
    fn rejects_internal_port_out_of_range() {
        let f = write_tmp("public_port: 5000\ninternal_port: 70000\n");
        assert!(matches!(
            ChallengeMetadata::load(f.path()),
            Err(ConfigError::InternalPortOutOfRange { .. })
        ));
    }

    #[test]
    fn rejects_malformed_yaml() {
        let f = write_tmp("public_port: [this, is, a, list]\n");
        assert!(ChallengeMetadata::load(f.path()).is_err());
    }
}
