//! Smoke tests wiring `cproxy-config`'s process config to `cproxy-core`'s
//! discovery, the same way `main` does, without touching the network.

use std::fs;

#[test]
fn empty_challenges_root_yields_empty_registry() {
    let root = tempfile::tempdir().unwrap();
    let registry = cproxy_core::registry::discover(root.path());
    assert!(registry.is_empty());
}

#[test]
fn one_well_formed_challenge_is_discovered_end_to_end() {
    let root = tempfile::tempdir().unwrap();
    let chal = root.path().join("pwn1");
    fs::create_dir(&chal).unwrap();
    fs::write(
        chal.join("challenge.yaml"),
        "public_port: 5001\ninternal_port: 1337\n",
    )
    .unwrap();
    fs::write(
        chal.join("docker-compose.yml"),
        "services:\n  web:\n    build: .\n    expose:\n      - 1337\n",
    )
    .unwrap();

    let registry = cproxy_core::registry::discover(root.path());
    assert_eq!(registry.len(), 1);
    let descriptor = registry.get(5001).unwrap();
    assert_eq!(descriptor.internal_port, 1337);
    assert_eq!(descriptor.main_service, "web");
}
