//! `docker-compose.yml` / `.yaml` manifest parsing
//!
//! Only the `services` map and each service's `expose` list are consumed —
//! everything else in the manifest is opaque to this proxy and is dropped
//! during parsing rather than modelled.

use crate::{ConfigError, Result};
use indexmap::IndexMap;
use serde::Deserialize;
use std::path::Path;

/// Services are kept in declaration order (`IndexMap`, not `HashMap`) because
/// the main-service fallback policy's last resort is "first service in
/// iteration order" — that's only meaningful if iteration order matches the
/// manifest's own top-to-bottom order.
#[derive(Debug, Clone, Deserialize)]
pub struct ComposeManifest {
    #[serde(default)]
    pub services: IndexMap<String, ComposeService>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ComposeService {
    #[serde(default)]
    pub expose: Vec<ExposedPort>,
}

/// `expose:` entries may be written as a bare number or a quoted string in
/// compose files in the wild; accept either.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExposedPort(pub u16);

impl<'de> Deserialize<'de> for ExposedPort {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Int(u16),
            Str(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Int(n) => Ok(ExposedPort(n)),
            Repr::Str(s) => s
                .trim()
                .parse::<u16>()
                .map(ExposedPort)
                .map_err(serde::de::Error::custom),
        }
    }
}

impl ComposeManifest {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;

        let manifest: Self = serde_yaml::from_str(&content).map_err(|e| ConfigError::Yaml {
            path: path.to_path_buf(),
            source: e,
        })?;

        if manifest.services.is_empty() {
            return Err(ConfigError::NoServices {
                path: path.to_path_buf(),
            });
        }

        Ok(manifest)
    }

    /// Locate `docker-compose.yml` then `docker-compose.yaml` inside `dir`.
    pub fn find_in(dir: &Path) -> Option<std::path::PathBuf> {
        let yml = dir.join("docker-compose.yml");
        if yml.is_file() {
            return Some(yml);
        }
        let yaml = dir.join("docker-compose.yaml");
        if yaml.is_file() {
            return Some(yaml);
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
    fn parses_services_and_expose() {
        let f = write_tmp(
            r#"
services:
  web:
    image: foo
    expose:
      - 80
      - "443"
  redis:
    image: redis
"#,
        );
        let manifest = ComposeManifest::load(f.path()).unwrap();
        assert_eq!(manifest.services.len(), 2);
        let web = &manifest.services["web"];
        assert_eq!(web.expose, vec![ExposedPort(80), ExposedPort(443)]);
        assert!(manifest.services["redis"].expose.is_empty());
    }

    #[test]
    fn rejects_empty_services() {
        let f = write_tmp("services: {}\n");
        assert!(matches!(
            ComposeManifest::load(f.path()),
            Err(ConfigError::NoServices { .. })
        ));
    }

    #[test]
    fn missing_services_key_is_empty_not_error_at_parse_time() {
        // Absence of `services:` parses to an empty map, which load() then
        // rejects via NoServices — the two checks are layered deliberately.
        let f = write_tmp("version: \"3\"\n");
        assert!(matches!(
            ComposeManifest::load(f.path()),
            Err(ConfigError::NoServices { .. })
        ));
    }
}
