//! Mock host for unit testing
//!
//! This module provides mock implementations of the host client seams that
//! can be used in unit tests without a running cluster or the CLIs:
//! - `MockHostClient` implements `HostClientTrait` over in-memory state
//! - `runner.rs` - `MockCommandRunner`, a scripted `CommandRunner`
//!
//! Values that change over time (connect output, secret contents, service
//! state) are scripted as sequences. Each call consumes one entry and the
//! last entry repeats forever.

mod runner;

pub use runner::MockCommandRunner;

use crate::error::ClientError;
use crate::host_trait::{HostClientTrait, HostConnector};
use crate::models::*;
use chrono::Utc;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use vcluster_types::namespace_for;

/// A sequence whose last entry sticks.
#[derive(Debug, Clone)]
pub(crate) struct Script<T> {
    items: VecDeque<T>,
}

impl<T> Default for Script<T> {
    fn default() -> Self {
        Self {
            items: VecDeque::new(),
        }
    }
}

impl<T: Clone> Script<T> {
    fn push(&mut self, item: T) {
        self.items.push_back(item);
    }

    fn next(&mut self) -> Option<T> {
        if self.items.len() > 1 {
            self.items.pop_front()
        } else {
            self.items.front().cloned()
        }
    }
}

/// Operations that can be made to fail with [`MockHostClient::fail`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOp {
    ListNamespaces,
    GetWorkloadStatus,
    GetService,
    AnnotateOwner,
    Create,
    Delete,
}

/// A `vcluster create` the mock has seen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateCall {
    pub name: String,
    pub working_dir: PathBuf,
    pub expose: bool,
    /// Contents of `vcluster.yaml` at the time of the call
    pub config: Option<String>,
}

/// Mock HostClient for testing
///
/// Stores namespaces, workloads and services in memory and replays scripted
/// responses for the calls the provisioning flow polls.
#[derive(Clone, Default)]
pub struct MockHostClient {
    pub(crate) namespaces: Arc<Mutex<Vec<NamespaceSummary>>>,
    pub(crate) workloads: Arc<Mutex<HashMap<String, WorkloadStatus>>>,
    pub(crate) services: Arc<Mutex<HashMap<String, Script<ServiceSnapshot>>>>,
    pub(crate) secrets: Arc<Mutex<HashMap<String, Script<Option<String>>>>>,
    pub(crate) connect: Arc<Mutex<Script<Result<Vec<u8>, String>>>>,
    pub(crate) failing: Arc<Mutex<HashSet<MockOp>>>,
    pub(crate) created: Arc<Mutex<Vec<CreateCall>>>,
    pub(crate) calls: Arc<Mutex<Vec<String>>>,
    pub(crate) credentials: Arc<Mutex<Vec<Option<PathBuf>>>>,
}

impl MockHostClient {
    /// Create an empty mock host
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a namespace to the mock store (for test setup)
    pub fn add_namespace(&self, namespace: NamespaceSummary) {
        self.namespaces.lock().unwrap().push(namespace);
    }

    /// Set the stateful workload status of a namespace
    pub fn set_workload(&self, namespace: &str, status: WorkloadStatus) {
        self.workloads
            .lock()
            .unwrap()
            .insert(namespace.to_string(), status);
    }

    /// Append a service state for `namespace`
    pub fn push_service(&self, namespace: &str, snapshot: ServiceSnapshot) {
        self.services
            .lock()
            .unwrap()
            .entry(namespace.to_string())
            .or_default()
            .push(snapshot);
    }

    /// Append a secret state for `namespace`; `None` means absent, otherwise
    /// the raw base64 value of the `config` key
    pub fn push_secret(&self, namespace: &str, value: Option<&str>) {
        self.secrets
            .lock()
            .unwrap()
            .entry(namespace.to_string())
            .or_default()
            .push(value.map(str::to_string));
    }

    /// Append a `connect --print` outcome
    pub fn push_connect(&self, result: Result<&str, &str>) {
        self.connect
            .lock()
            .unwrap()
            .push(result.map(|k| k.as_bytes().to_vec()).map_err(str::to_string));
    }

    /// Make every call of `op` fail
    pub fn fail(&self, op: MockOp) {
        self.failing.lock().unwrap().insert(op);
    }

    /// Names of the operations called, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, op: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == op).count()
    }

    /// Credentials passed to [`HostConnector::connect`], in order
    pub fn credentials_used(&self) -> Vec<Option<PathBuf>> {
        self.credentials.lock().unwrap().clone()
    }

    pub fn created(&self) -> Vec<CreateCall> {
        self.created.lock().unwrap().clone()
    }

    pub fn namespace(&self, name: &str) -> Option<NamespaceSummary> {
        self.namespaces
            .lock()
            .unwrap()
            .iter()
            .find(|ns| ns.name == name)
            .cloned()
    }

    fn record(&self, op: &str) {
        self.calls.lock().unwrap().push(op.to_string());
    }

    fn check(&self, op: MockOp) -> Result<(), ClientError> {
        if self.failing.lock().unwrap().contains(&op) {
            return Err(ClientError::CommandFailed {
                tool: "mock".to_string(),
                status: "exit status: 1".to_string(),
                output: format!("{op:?} failed"),
            });
        }
        Ok(())
    }
}

impl HostConnector for MockHostClient {
    /// Every connection shares the same in-memory host.
    fn connect(&self, kubeconfig: Option<&Path>) -> Arc<dyn HostClientTrait> {
        self.credentials
            .lock()
            .unwrap()
            .push(kubeconfig.map(Path::to_path_buf));
        Arc::new(self.clone())
    }
}

#[async_trait::async_trait]
impl HostClientTrait for MockHostClient {
    async fn list_namespaces(&self) -> Result<Vec<NamespaceSummary>, ClientError> {
        self.record("list_namespaces");
        self.check(MockOp::ListNamespaces)?;
        Ok(self.namespaces.lock().unwrap().clone())
    }

    async fn get_workload_status(&self, name: &str, namespace: &str) -> Result<WorkloadStatus, ClientError> {
        self.record("get_workload_status");
        self.check(MockOp::GetWorkloadStatus)?;
        self.workloads
            .lock()
            .unwrap()
            .get(namespace)
            .copied()
            .ok_or_else(|| ClientError::NotFound(format!("statefulset {namespace}/{name}")))
    }

    async fn get_service(&self, name: &str, namespace: &str) -> Result<ServiceSnapshot, ClientError> {
        self.record("get_service");
        self.check(MockOp::GetService)?;
        self.services
            .lock()
            .unwrap()
            .get_mut(namespace)
            .and_then(Script::next)
            .ok_or_else(|| ClientError::NotFound(format!("service {namespace}/{name}")))
    }

    async fn get_secret_config(&self, secret: &str, namespace: &str) -> Result<String, ClientError> {
        self.record("get_secret_config");
        self.secrets
            .lock()
            .unwrap()
            .get_mut(namespace)
            .and_then(Script::next)
            .flatten()
            .ok_or_else(|| ClientError::NotFound(format!("secret {namespace}/{secret}")))
    }

    async fn annotate_owner(&self, namespace: &str, owner: &str) -> Result<(), ClientError> {
        self.record("annotate_owner");
        self.check(MockOp::AnnotateOwner)?;
        let mut namespaces = self.namespaces.lock().unwrap();
        let ns = namespaces
            .iter_mut()
            .find(|ns| ns.name == namespace)
            .ok_or_else(|| ClientError::NotFound(format!("namespace {namespace}")))?;
        ns.owner = Some(owner.to_string());
        Ok(())
    }

    async fn create_virtual_cluster(&self, name: &str, working_dir: &Path, expose: bool) -> Result<String, ClientError> {
        self.record("create_virtual_cluster");
        self.check(MockOp::Create)?;
        self.created.lock().unwrap().push(CreateCall {
            name: name.to_string(),
            working_dir: working_dir.to_path_buf(),
            expose,
            config: std::fs::read_to_string(working_dir.join(crate::CONFIG_FILE_NAME)).ok(),
        });
        let namespace = namespace_for(name);
        let mut namespaces = self.namespaces.lock().unwrap();
        if !namespaces.iter().any(|ns| ns.name == namespace) {
            namespaces.push(NamespaceSummary::new(namespace, Some(Utc::now())));
        }
        Ok(format!("created virtual cluster {name}"))
    }

    async fn connect_virtual_cluster(&self, name: &str, _namespace: &str) -> Result<Vec<u8>, ClientError> {
        self.record("connect_virtual_cluster");
        match self.connect.lock().unwrap().next() {
            Some(Ok(kubeconfig)) => Ok(kubeconfig),
            Some(Err(output)) => Err(ClientError::CommandFailed {
                tool: "vcluster".to_string(),
                status: "exit status: 1".to_string(),
                output,
            }),
            None => Err(ClientError::CommandFailed {
                tool: "vcluster".to_string(),
                status: "exit status: 1".to_string(),
                output: format!("no kubeconfig for virtual cluster {name}"),
            }),
        }
    }

    async fn delete_virtual_cluster(&self, name: &str) -> Result<String, ClientError> {
        self.record("delete_virtual_cluster");
        self.check(MockOp::Delete)?;
        let namespace = namespace_for(name);
        self.namespaces
            .lock()
            .unwrap()
            .retain(|ns| ns.name != namespace);
        Ok(format!("deleted virtual cluster {name}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_last_entry_sticks() {
        let mut script = Script::default();
        script.push(1);
        script.push(2);
        assert_eq!(script.next(), Some(1));
        assert_eq!(script.next(), Some(2));
        assert_eq!(script.next(), Some(2));
    }

    #[tokio::test]
    async fn test_secret_sequence() {
        let mock = MockHostClient::new();
        mock.push_secret("vcluster-demo", None);
        mock.push_secret("vcluster-demo", Some(""));
        mock.push_secret("vcluster-demo", Some("YQ=="));

        assert!(mock
            .get_secret_config("vc-demo", "vcluster-demo")
            .await
            .unwrap_err()
            .is_not_found());
        assert_eq!(mock.get_secret_config("vc-demo", "vcluster-demo").await.unwrap(), "");
        assert_eq!(mock.get_secret_config("vc-demo", "vcluster-demo").await.unwrap(), "YQ==");
        assert_eq!(mock.call_count("get_secret_config"), 3);
    }

    #[tokio::test]
    async fn test_create_and_delete_track_namespace() {
        let mock = MockHostClient::new();
        let dir = std::env::temp_dir();
        mock.create_virtual_cluster("demo", &dir, false).await.unwrap();
        assert!(mock.namespace("vcluster-demo").is_some());

        mock.annotate_owner("vcluster-demo", "alice").await.unwrap();
        assert_eq!(mock.namespace("vcluster-demo").unwrap().owner.as_deref(), Some("alice"));

        mock.delete_virtual_cluster("demo").await.unwrap();
        assert!(mock.namespace("vcluster-demo").is_none());
    }
}
