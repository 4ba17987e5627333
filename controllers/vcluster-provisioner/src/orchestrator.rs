//! Provisioning orchestrator.
//!
//! Drives one creation request through its stages:
//!
//! ```text
//! Received -> ConfigWritten -> Creating -> AwaitingReadiness
//!          -> CredentialRetrieval -> OwnershipTagged -> Complete
//! ```
//!
//! Writing the config, `vcluster create` and credential retrieval abort the
//! request on failure. Tagging ownership only logs a warning; the owner
//! annotation is advisory and only drives list visibility.

use crate::config::ProvisioningPolicy;
use crate::credentials::{kubeconfig_path, CredentialRetriever};
use crate::error::ProvisionError;
use crate::poll::pause;
use host_client::{HostClientTrait, CONFIG_FILE_NAME};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use vcluster_types::VirtualClusterSpec;

/// Name the uploaded host credentials are saved under.
pub const UPLOADED_KUBECONFIG: &str = "uploaded.yaml";

/// One creation request and the directory its artifacts go to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisioningRequest {
    pub request_id: String,
    pub working_dir: PathBuf,
    /// Host credentials uploaded with the request
    pub uploaded_credentials: Option<PathBuf>,
}

impl ProvisioningRequest {
    pub fn new(request_id: impl Into<String>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            request_id: request_id.into(),
            working_dir: working_dir.into(),
            uploaded_credentials: None,
        }
    }

    pub fn config_path(&self) -> PathBuf {
        self.working_dir.join(CONFIG_FILE_NAME)
    }

    pub fn kubeconfig_path(&self, name: &str) -> PathBuf {
        kubeconfig_path(&self.working_dir, name)
    }

    /// Save uploaded host credentials into the working directory. The
    /// stored path is absolute since the tools run in other directories.
    pub async fn save_upload(&mut self, contents: &[u8]) -> Result<PathBuf, ProvisionError> {
        tokio::fs::create_dir_all(&self.working_dir).await?;
        let path = std::path::absolute(self.working_dir.join(UPLOADED_KUBECONFIG))?;
        tokio::fs::write(&path, contents).await?;
        self.uploaded_credentials = Some(path.clone());
        Ok(path)
    }
}

/// Stages of a creation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    ConfigWritten,
    Creating,
    AwaitingReadiness,
    CredentialRetrieval,
    OwnershipTagged,
    Complete,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Received => "Received",
            Self::ConfigWritten => "ConfigWritten",
            Self::Creating => "Creating",
            Self::AwaitingReadiness => "AwaitingReadiness",
            Self::CredentialRetrieval => "CredentialRetrieval",
            Self::OwnershipTagged => "OwnershipTagged",
            Self::Complete => "Complete",
        };
        f.write_str(name)
    }
}

/// Drives one virtual cluster through creation or deletion on the host.
pub struct Orchestrator {
    host: Arc<dyn HostClientTrait>,
    policy: ProvisioningPolicy,
}

impl Orchestrator {
    /// Orchestrator acting on `host` with the poll schedules of `policy`.
    pub fn new(host: Arc<dyn HostClientTrait>, policy: ProvisioningPolicy) -> Self {
        Self { host, policy }
    }

    /// Create the virtual cluster described by `spec` and return its
    /// kubeconfig, also stored under the request directory.
    pub async fn provision(
        &self,
        request: &ProvisioningRequest,
        spec: &VirtualClusterSpec,
        owner: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, ProvisionError> {
        let result = self.run(request, spec, owner, cancel).await;
        if let Err(e) = &result {
            error!(request_id = %request.request_id, cluster = %spec.name, error = %e, "provisioning failed");
        }
        result
    }

    async fn run(
        &self,
        request: &ProvisioningRequest,
        spec: &VirtualClusterSpec,
        owner: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, ProvisionError> {
        let name = spec.name.as_str();
        let namespace = spec.namespace();
        let transition = |stage: Stage| {
            info!(request_id = %request.request_id, cluster = %name, stage = %stage, "provisioning");
        };

        transition(Stage::Received);
        write_config(&request.config_path(), spec).await?;

        transition(Stage::ConfigWritten);
        transition(Stage::Creating);
        let output = self
            .host
            .create_virtual_cluster(name, &request.working_dir, spec.expose_externally)
            .await
            .map_err(ProvisionError::Create)?;
        debug!(cluster = %name, "vcluster create output:\n{}", output);

        transition(Stage::AwaitingReadiness);
        pause(self.policy.readiness_delay, "readiness delay", cancel).await?;

        transition(Stage::CredentialRetrieval);
        let kubeconfig = CredentialRetriever::new(Arc::clone(&self.host), self.policy)
            .fetch(
                name,
                &namespace,
                spec.expose_externally,
                &request.kubeconfig_path(name),
                cancel,
            )
            .await?;

        match self.host.annotate_owner(&namespace, owner).await {
            Ok(()) => transition(Stage::OwnershipTagged),
            Err(e) => warn!(cluster = %name, owner = %owner, error = %e, "failed to record owner"),
        }

        transition(Stage::Complete);
        Ok(kubeconfig)
    }

    /// Tear down `name` and its namespace.
    pub async fn delete(&self, name: &str) -> Result<(), ProvisionError> {
        info!(cluster = %name, "deleting virtual cluster");
        let output = self
            .host
            .delete_virtual_cluster(name)
            .await
            .map_err(ProvisionError::Delete)?;
        debug!(cluster = %name, "vcluster delete output:\n{}", output);
        info!(cluster = %name, "virtual cluster deleted");
        Ok(())
    }
}

async fn write_config(path: &Path, spec: &VirtualClusterSpec) -> Result<(), ProvisionError> {
    let config_write = |source: std::io::Error| ProvisionError::ConfigWrite {
        path: path.to_path_buf(),
        source,
    };
    let yaml = spec
        .to_yaml()
        .map_err(|e| config_write(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
    if let Some(dir) = path.parent() {
        tokio::fs::create_dir_all(dir).await.map_err(config_write)?;
    }
    tokio::fs::write(path, yaml).await.map_err(config_write)
}
