//! Readiness probing and on-demand container start

use crate::registry::ChallengeDescriptor;
use cproxy_driver::ComposeDriver;
use std::time::Duration;

/// Timeout for the main service's TCP connect-probe.
const CONNECT_PROBE_TIMEOUT: Duration = Duration::from_secs(2);
/// Total budget `ensure_ready` allows for a cold start before giving up.
const ENSURE_READY_BUDGET: Duration = Duration::from_secs(60);
/// Interval between probes while polling for readiness after a bring-up.
const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Probe every service's current state. Returns true iff all services are
/// ready. Every service is visited regardless of an earlier not-ready
/// verdict, so its state is refreshed even when the overall result is false.
pub async fn probe(driver: &dyn ComposeDriver, descriptor: &ChallengeDescriptor) -> bool {
    let mut all_ready = true;

    for (name, state_lock) in &descriptor.services {
        let ids = driver
            .list_container_ids(&descriptor.compose_path, &descriptor.source_dir, name)
            .await
            .unwrap_or_default();

        let container_id = ids.into_iter().next();

        let Some(container_id) = container_id else {
            let mut state = state_lock.lock().await;
            state.container_id = None;
            state.ip_address = None;
            state.accepts_connections = false;
            state.last_error = Some("Container not running".to_string());
            all_ready = false;
            continue;
        };

        let ip = driver
            .inspect_container(&container_id)
            .await
            .unwrap_or(None);

        let Some(ip) = ip else {
            let mut state = state_lock.lock().await;
            state.container_id = Some(container_id);
            state.ip_address = None;
            state.accepts_connections = false;
            state.last_error = Some("Could not determine container IP".to_string());
            all_ready = false;
            continue;
        };

        let mut state = state_lock.lock().await;
        if !state.is_main {
            state.container_id = Some(container_id);
            state.ip_address = Some(ip);
            state.last_error = None;
            continue;
        }
        drop(state);

        let accepts = tokio::time::timeout(
            CONNECT_PROBE_TIMEOUT,
            tokio::net::TcpStream::connect((ip, descriptor.internal_port)),
        )
        .await
        .map(|r| r.is_ok())
        .unwrap_or(false);

        let mut state = state_lock.lock().await;
        state.container_id = Some(container_id);
        state.ip_address = Some(ip);
        state.accepts_connections = accepts;
        state.last_error = if accepts {
            None
        } else {
            Some("Main service not accepting connections".to_string())
        };

        if !accepts {
            all_ready = false;
        }
    }

    all_ready
}

/// Probe; if not ready, bring the challenge up and poll until ready or the
/// ensure-ready budget is exhausted. Serialized per descriptor via
/// `descriptor.start_lock` so concurrent callers don't issue redundant
/// `bring_up` invocations — `probe` itself is never serialized.
pub async fn ensure_ready(driver: &dyn ComposeDriver, descriptor: &ChallengeDescriptor) -> bool {
    ensure_ready_with_budget(driver, descriptor, ENSURE_READY_BUDGET, POLL_INTERVAL).await
}

async fn ensure_ready_with_budget(
    driver: &dyn ComposeDriver,
    descriptor: &ChallengeDescriptor,
    budget: Duration,
    poll_interval: Duration,
) -> bool {
    if probe(driver, descriptor).await {
        return true;
    }

    let _guard = descriptor.start_lock.lock().await;

    // Re-check now that we hold the lock: another caller may have already
    // brought the challenge up while we were waiting for it.
    if probe(driver, descriptor).await {
        return true;
    }

    tracing::info!(challenge = %descriptor.display_name, "bringing up challenge");
    let started = driver
        .bring_up(&descriptor.compose_path, &descriptor.source_dir)
        .await
        .unwrap_or(false);

    if !started {
        tracing::error!(challenge = %descriptor.display_name, "bring_up failed");
        return false;
    }

    let deadline = tokio::time::Instant::now() + budget;
    loop {
        if probe(driver, descriptor).await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            tracing::error!(
                challenge = %descriptor.display_name,
                "readiness timeout after {:?}",
                budget
            );
            return false;
        }
        tokio::time::sleep(poll_interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cproxy_driver::test_support::MockComposeDriver;
    use std::collections::HashMap;
    use std::net::{IpAddr, Ipv4Addr};
    use std::path::PathBuf;
    use tokio::sync::Mutex as AsyncMutex;

    fn descriptor_with(services: Vec<(&str, bool)>, internal_port: u16) -> ChallengeDescriptor {
        let mut map = HashMap::new();
        for (name, is_main) in services {
            map.insert(
                name.to_string(),
                AsyncMutex::new(crate::registry::ServiceState {
                    name: name.to_string(),
                    is_main,
                    ..Default::default()
                }),
            );
        }
        ChallengeDescriptor {
            public_port: 5000,
            internal_port,
            main_service: "web".to_string(),
            services: map,
            source_dir: PathBuf::from("/tmp/chal"),
            compose_path: PathBuf::from("/tmp/chal/docker-compose.yml"),
            display_name: "chal".to_string(),
            start_lock: AsyncMutex::new(()),
        }
    }

    #[tokio::test]
    async fn probe_fails_closed_when_container_not_running() {
        let driver = MockComposeDriver::new();
        let descriptor = descriptor_with(vec![("web", true)], 80);

        assert!(!probe(&driver, &descriptor).await);
        let state = descriptor.services["web"].lock().await;
        assert_eq!(state.last_error.as_deref(), Some("Container not running"));
    }

    #[tokio::test]
    async fn probe_visits_every_service_even_after_early_failure() {
        let driver = MockComposeDriver::new();
        driver.set_running("sidecar", "cid1", IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5)));
        let descriptor = descriptor_with(vec![("web", true), ("sidecar", false)], 80);

        assert!(!probe(&driver, &descriptor).await);
        assert!(descriptor.services["sidecar"].lock().await.ip_address.is_some());
        assert!(descriptor.services["web"].lock().await.ip_address.is_none());
    }

    #[tokio::test]
    async fn ensure_ready_is_idempotent_when_already_ready() {
        let driver = MockComposeDriver::new();
        // Bind a real local listener to stand in for "main service accepts connections".
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            loop {
                if listener.accept().await.is_err() {
                    break;
                }
            }
        });

        driver.set_running("web", "cid1", IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)));
        let descriptor = descriptor_with(vec![("web", true)], port);

        assert!(ensure_ready(&driver, &descriptor).await);
        assert_eq!(driver.call_count(|c| matches!(c, cproxy_driver::test_support::MockCall::BringUp { .. })), 0);
    }

    #[tokio::test]
    async fn ensure_ready_returns_false_when_bring_up_fails() {
        let driver = MockComposeDriver::new();
        driver.fail_bring_up();
        let descriptor = descriptor_with(vec![("web", true)], 80);

        assert!(!ensure_ready(&driver, &descriptor).await);
    }

    #[tokio::test]
    async fn ensure_ready_times_out_when_container_never_listens() {
        // bring_up succeeds but nothing is ever registered as running, so
        // every poll still sees "container not running" — exercises the
        // poll-until-budget-exhausted path with a budget small enough to
        // run fast.
        let driver = MockComposeDriver::new();
        let descriptor = descriptor_with(vec![("web", true)], 80);

        let ready = ensure_ready_with_budget(
            &driver,
            &descriptor,
            Duration::from_millis(50),
            Duration::from_millis(10),
        )
        .await;

        assert!(!ready);
        assert!(driver.call_count(|c| matches!(c, cproxy_driver::test_support::MockCall::BringUp { .. })) >= 1);
    }

    #[tokio::test]
    async fn concurrent_ensure_ready_calls_issue_a_single_bring_up() {
        use std::sync::Arc;

        // Nothing is registered as running until a watcher observes the
        // first bring_up call and flips the driver's state — so only the
        // caller that actually takes the start path can make any progress;
        // everyone else must be waiting on `start_lock`.
        let driver = Arc::new(MockComposeDriver::new());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            loop {
                if listener.accept().await.is_err() {
                    break;
                }
            }
        });
        let descriptor = Arc::new(descriptor_with(vec![("web", true)], port));

        let watcher_driver = driver.clone();
        tokio::spawn(async move {
            loop {
                let became_running = watcher_driver
                    .call_count(|c| matches!(c, cproxy_driver::test_support::MockCall::BringUp { .. }))
                    > 0;
                if became_running {
                    watcher_driver.set_running(
                        "web",
                        "cid1",
                        IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
                    );
                    break;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        });

        let mut handles = Vec::new();
        for _ in 0..5 {
            let driver = driver.clone();
            let descriptor = descriptor.clone();
            handles.push(tokio::spawn(async move {
                ensure_ready(driver.as_ref(), descriptor.as_ref()).await
            }));
        }

        for h in handles {
            assert!(h.await.unwrap());
        }

        assert_eq!(
            driver.call_count(|c| matches!(c, cproxy_driver::test_support::MockCall::BringUp { .. })),
            1
        );
    }
}
