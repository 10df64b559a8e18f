//! Mock `ComposeDriver` for unit testing the readiness engine and connection
//! handler without requiring a real compose installation.

use crate::{ComposeDriver, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Records which operations were invoked, in order, for call-count assertions
/// (e.g. "exactly one bring_up per cold start").
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    ListContainerIds { service: String },
    InspectContainer { container_id: String },
    BringUp { compose_path: PathBuf },
}

/// A fully scriptable `ComposeDriver`: each service has its own recorded
/// container id and IP, and `bring_up` can be told to succeed or fail (to
/// exercise the readiness timeout path).
pub struct MockComposeDriver {
    calls: Mutex<Vec<MockCall>>,
    container_ids: Mutex<HashMap<String, Vec<String>>>,
    ips: Mutex<HashMap<String, IpAddr>>,
    bring_up_result: Mutex<bool>,
}

impl MockComposeDriver {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            container_ids: Mutex::new(HashMap::new()),
            ips: Mutex::new(HashMap::new()),
            bring_up_result: Mutex::new(true),
        }
    }

    /// Make `list_container_ids` report `id` running for `service`.
    pub fn set_running(&self, service: &str, id: &str, ip: IpAddr) {
        self.container_ids
            .lock()
            .unwrap()
            .insert(service.to_string(), vec![id.to_string()]);
        self.ips.lock().unwrap().insert(id.to_string(), ip);
    }

    /// Make `bring_up` report failure.
    pub fn fail_bring_up(&self) {
        *self.bring_up_result.lock().unwrap() = false;
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, pred: impl Fn(&MockCall) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| pred(c)).count()
    }
}

impl Default for MockComposeDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ComposeDriver for MockComposeDriver {
    async fn list_container_ids(
        &self,
        _compose_path: &Path,
        _work_dir: &Path,
        service_name: &str,
    ) -> Result<Vec<String>> {
        self.calls.lock().unwrap().push(MockCall::ListContainerIds {
            service: service_name.to_string(),
        });
        Ok(self
            .container_ids
            .lock()
            .unwrap()
            .get(service_name)
            .cloned()
            .unwrap_or_default())
    }

    async fn inspect_container(&self, container_id: &str) -> Result<Option<IpAddr>> {
        self.calls.lock().unwrap().push(MockCall::InspectContainer {
            container_id: container_id.to_string(),
        });
        Ok(self.ips.lock().unwrap().get(container_id).copied())
    }

    async fn bring_up(&self, compose_path: &Path, _work_dir: &Path) -> Result<bool> {
        self.calls.lock().unwrap().push(MockCall::BringUp {
            compose_path: compose_path.to_path_buf(),
        });
        Ok(*self.bring_up_result.lock().unwrap())
    }
}
