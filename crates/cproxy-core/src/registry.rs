//! Challenge discovery and the immutable registry it produces

use cproxy_config::{ChallengeMetadata, ComposeManifest};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;

/// Directory names that are never challenge bundles even if they happen to
/// sit directly under the challenge root.
const SKIPPED_DIR_NAMES: &[&str] = &["__pycache__", "node_modules", ".git"];

/// Per-service runtime state, refreshed only by the readiness engine.
#[derive(Debug, Clone, Default)]
pub struct ServiceState {
    pub name: String,
    pub is_main: bool,
    pub container_id: Option<String>,
    pub ip_address: Option<std::net::IpAddr>,
    pub accepts_connections: bool,
    pub last_error: Option<String>,
}

impl ServiceState {
    fn new(name: String, is_main: bool) -> Self {
        Self {
            name,
            is_main,
            ..Default::default()
        }
    }
}

/// One challenge, keyed by its public port. Immutable once discovery
/// finishes — only the `Mutex`-wrapped per-service state mutates afterwards.
pub struct ChallengeDescriptor {
    pub public_port: u16,
    pub internal_port: u16,
    pub main_service: String,
    pub services: HashMap<String, AsyncMutex<ServiceState>>,
    pub source_dir: PathBuf,
    pub compose_path: PathBuf,
    pub display_name: String,
    /// Serializes `ensure_ready` per descriptor so concurrent cold-start
    /// clients don't each issue their own redundant `bring_up`.
    pub start_lock: AsyncMutex<()>,
}

/// Immutable mapping from public port to challenge descriptor, built once at
/// startup and shared read-only from then on.
pub struct ChallengeRegistry {
    descriptors: HashMap<u16, Arc<ChallengeDescriptor>>,
}

impl ChallengeRegistry {
    pub fn empty() -> Self {
        Self {
            descriptors: HashMap::new(),
        }
    }

    pub fn get(&self, public_port: u16) -> Option<Arc<ChallengeDescriptor>> {
        self.descriptors.get(&public_port).cloned()
    }

    pub fn public_ports(&self) -> impl Iterator<Item = u16> + '_ {
        self.descriptors.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

/// Scan `root` once and build the registry. Never fails as a whole: any
/// per-directory problem is logged and that directory is skipped.
pub fn discover(root: &Path) -> ChallengeRegistry {
    let mut descriptors: HashMap<u16, Arc<ChallengeDescriptor>> = HashMap::new();
    let mut claimed_by: HashMap<u16, String> = HashMap::new();

    let entries = match std::fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(root = %root.display(), error = %e, "cannot read challenges root");
            return ChallengeRegistry {
                descriptors: HashMap::new(),
            };
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let dir_name = match path.file_name().and_then(|n| n.to_str()) {
            Some(n) => n,
            None => continue,
        };
        if dir_name.starts_with('.') || SKIPPED_DIR_NAMES.contains(&dir_name) {
            continue;
        }

        match load_descriptor(&path) {
            Ok(Some(descriptor)) => {
                if let Some(existing_dir) = claimed_by.get(&descriptor.public_port) {
                    tracing::error!(
                        public_port = descriptor.public_port,
                        winner = %existing_dir,
                        loser = %descriptor.display_name,
                        "duplicate public port; first-seen directory wins"
                    );
                    continue;
                }
                claimed_by.insert(descriptor.public_port, descriptor.display_name.clone());
                descriptors.insert(descriptor.public_port, Arc::new(descriptor));
            }
            Ok(None) => {
                // Not a challenge directory (missing metadata or compose file); silently skip.
            }
            Err(e) => {
                tracing::warn!(dir = %path.display(), error = %e, "skipping malformed challenge directory");
            }
        }
    }

    if descriptors.is_empty() {
        tracing::warn!(root = %root.display(), "no valid challenges discovered");
    }

    ChallengeRegistry { descriptors }
}

#[derive(Debug, thiserror::Error)]
enum LoadError {
    #[error(transparent)]
    Config(#[from] cproxy_config::ConfigError),
}

/// Build a `ChallengeDescriptor` for `dir`, or `Ok(None)` if `dir` isn't a
/// challenge bundle at all (no metadata or no compose file present).
fn load_descriptor(dir: &Path) -> std::result::Result<Option<ChallengeDescriptor>, LoadError> {
    let Some(metadata_path) = ChallengeMetadata::find_in(dir) else {
        return Ok(None);
    };
    let Some(compose_path) = ComposeManifest::find_in(dir) else {
        return Ok(None);
    };

    let metadata = ChallengeMetadata::load(&metadata_path)?;
    let manifest = ComposeManifest::load(&compose_path)?;

    let display_name = dir
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| dir.display().to_string());

    let main_service = select_main_service(&manifest, &metadata, &display_name);

    let mut services = HashMap::new();
    for name in manifest.services.keys() {
        let is_main = *name == main_service;
        services.insert(name.clone(), AsyncMutex::new(ServiceState::new(name.clone(), is_main)));
    }

    Ok(Some(ChallengeDescriptor {
        public_port: metadata.public_port as u16,
        internal_port: metadata.internal_port as u16,
        main_service,
        services,
        source_dir: dir.to_path_buf(),
        compose_path,
        display_name,
        start_lock: AsyncMutex::new(()),
    }))
}

/// Implements the ordered main-service selection policy from the component
/// design: (a) unique exposer of `internal_port`, (b) first service with any
/// `expose`, (c) `service_name` hint (if it names a declared service), (d)
/// first service in manifest order. Every step past (a) is a fallback and
/// logs a warning when taken, including a present-but-unmatched hint falling
/// through to (d).
fn select_main_service(
    manifest: &ComposeManifest,
    metadata: &ChallengeMetadata,
    display_name: &str,
) -> String {
    let internal_port = metadata.internal_port as u16;

    let exposers: Vec<&String> = manifest
        .services
        .iter()
        .filter(|(_, svc)| svc.expose.iter().any(|p| p.0 == internal_port))
        .map(|(name, _)| name)
        .collect();

    if exposers.len() == 1 {
        return exposers[0].clone();
    }

    if let Some((name, _)) = manifest.services.iter().find(|(_, svc)| !svc.expose.is_empty()) {
        tracing::warn!(
            challenge = display_name,
            service = %name,
            "main service chosen by 'first service with any expose' fallback"
        );
        return name.clone();
    }

    if let Some(hint) = &metadata.service_name {
        if manifest.services.contains_key(hint) {
            return hint.clone();
        }
        tracing::warn!(
            challenge = display_name,
            hint = %hint,
            "service_name hint does not name a declared service; falling back to first service in manifest order"
        );
    }

    // manifest.services is guaranteed non-empty by ComposeManifest::load.
    let (first, _) = manifest.services.iter().next().expect("non-empty services");
    tracing::warn!(
        challenge = display_name,
        service = %first,
        "main service chosen by 'first service in manifest order' fallback"
    );
    first.clone()
}
