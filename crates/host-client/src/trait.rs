//! HostClient trait for mocking
//!
//! This trait abstracts the HostClient so the provisioning service can be
//! unit tested against an in-memory host.

use crate::error::ClientError;
use crate::models::*;
use std::path::Path;
use std::sync::Arc;

/// Operations kubehatch performs against the host cluster.
///
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait HostClientTrait: Send + Sync {
    // Resource inspection
    async fn list_namespaces(&self) -> Result<Vec<NamespaceSummary>, ClientError>;
    /// `NotFound` while the workload has not been created yet
    async fn get_workload_status(&self, name: &str, namespace: &str) -> Result<WorkloadStatus, ClientError>;
    async fn get_service(&self, name: &str, namespace: &str) -> Result<ServiceSnapshot, ClientError>;
    /// Raw (still base64 encoded) value of the secret's `config` key; empty
    /// when the key is not populated yet
    async fn get_secret_config(&self, secret: &str, namespace: &str) -> Result<String, ClientError>;

    // Mutations
    async fn annotate_owner(&self, namespace: &str, owner: &str) -> Result<(), ClientError>;

    // Provisioning CLI
    /// Run `vcluster create` in `working_dir` against `vcluster.yaml`
    async fn create_virtual_cluster(&self, name: &str, working_dir: &Path, expose: bool) -> Result<String, ClientError>;
    /// Kubeconfig printed by `vcluster connect --print`
    async fn connect_virtual_cluster(&self, name: &str, namespace: &str) -> Result<Vec<u8>, ClientError>;
    async fn delete_virtual_cluster(&self, name: &str) -> Result<String, ClientError>;
}

/// Hands out clients bound to a set of host credentials.
///
/// Credentials are chosen per request (an uploaded file, the mounted secret
/// or the in-cluster default), so callers ask for a client each time.
pub trait HostConnector: Send + Sync {
    fn connect(&self, kubeconfig: Option<&Path>) -> Arc<dyn HostClientTrait>;
}
