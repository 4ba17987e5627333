//! Host cluster client
//!
//! Wraps kubectl and the vcluster CLI behind typed operations. Every call is
//! a single subprocess run through a [`CommandRunner`]; nothing here retries.

use crate::error::ClientError;
use crate::exec::{CommandOutput, CommandRunner, Invocation, ProcessRunner, Tool};
use crate::host_trait::{HostClientTrait, HostConnector};
use crate::models::*;
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::{Namespace, Service};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;
use vcluster_types::{OWNER_ANNOTATION, SECRET_CONFIG_KEY};

/// Name of the declarative config `vcluster create` reads from its
/// working directory.
pub const CONFIG_FILE_NAME: &str = "vcluster.yaml";

/// What kubectl's Go template prints for a missing key.
const NO_VALUE: &str = "<no value>";

/// Host cluster client
#[derive(Clone)]
pub struct HostClient {
    runner: Arc<dyn CommandRunner>,
    kubeconfig: Option<PathBuf>,
}

impl HostClient {
    /// Create a client
    ///
    /// # Arguments
    /// * `runner` - executes the tools
    /// * `kubeconfig` - host credentials; `None` uses the tools' own defaults
    ///   (in-cluster config when running in a pod)
    pub fn new(runner: Arc<dyn CommandRunner>, kubeconfig: Option<PathBuf>) -> Self {
        Self { runner, kubeconfig }
    }

    /// Client running the real binaries.
    pub fn with_binaries(
        kubectl_bin: impl Into<String>,
        vcluster_bin: impl Into<String>,
        kubeconfig: Option<PathBuf>,
    ) -> Self {
        Self::new(
            Arc::new(ProcessRunner::new(kubectl_bin, vcluster_bin)),
            kubeconfig,
        )
    }

    /// Same runner, different host credentials.
    #[must_use]
    pub fn with_kubeconfig(&self, kubeconfig: Option<PathBuf>) -> Self {
        Self {
            runner: Arc::clone(&self.runner),
            kubeconfig,
        }
    }

    pub fn kubeconfig(&self) -> Option<&Path> {
        self.kubeconfig.as_deref()
    }

    /// kubectl invocation with `--kubeconfig` prepended when configured.
    fn kubectl<I, S>(&self, args: I) -> Invocation
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Invocation::new(Tool::Kubectl, self.with_kubeconfig_flag(args))
    }

    /// vcluster invocation. The CLI would otherwise pick up the pod's
    /// in-cluster variables, so they are stripped and `KUBECONFIG` is set.
    fn vcluster<I, S>(&self, args: I) -> Invocation
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Invocation::new(Tool::Vcluster, args)
            .strip_cluster_env()
            .with_kubeconfig(self.kubeconfig())
    }

    fn with_kubeconfig_flag<I, S>(&self, args: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut full = Vec::new();
        if let Some(path) = &self.kubeconfig {
            full.push("--kubeconfig".to_string());
            full.push(path.display().to_string());
        }
        full.extend(args.into_iter().map(Into::into));
        full
    }

    /// Run and map a non-zero exit to [`ClientError::CommandFailed`] with
    /// everything the tool printed.
    async fn execute(&self, invocation: Invocation) -> Result<CommandOutput, ClientError> {
        let output = self.runner.run(&invocation).await?;
        if output.success {
            return Ok(output);
        }
        let text = output.combined();
        Err(ClientError::CommandFailed {
            tool: invocation.tool.to_string(),
            status: output.status,
            output: text,
        })
    }

    /// Like [`Self::execute`] for kubectl object reads, where an absent
    /// object is reported as [`ClientError::NotFound`] naming `what`.
    async fn inspect(&self, invocation: Invocation, what: &str) -> Result<CommandOutput, ClientError> {
        match self.execute(invocation).await {
            Err(ClientError::CommandFailed { output, .. }) if is_not_found(&output) => {
                debug!("{} not found: {}", what, output.trim());
                Err(ClientError::NotFound(what.to_string()))
            }
            other => other,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, invocation: Invocation, what: &str) -> Result<T, ClientError> {
        let output = self.inspect(invocation, what).await?;
        serde_json::from_slice(&output.stdout).map_err(|source| ClientError::Parse {
            what: what.to_string(),
            source,
        })
    }
}

/// kubectl reports absent objects as `Error from server (NotFound): ...`.
fn is_not_found(output: &str) -> bool {
    output.contains("NotFound")
}

fn stdout_text(output: &CommandOutput, what: &str) -> Result<String, ClientError> {
    String::from_utf8(output.stdout.clone()).map_err(|_| ClientError::Encoding(what.to_string()))
}

impl HostConnector for HostClient {
    fn connect(&self, kubeconfig: Option<&Path>) -> Arc<dyn HostClientTrait> {
        Arc::new(self.with_kubeconfig(kubeconfig.map(Path::to_path_buf)))
    }
}

#[async_trait::async_trait]
impl HostClientTrait for HostClient {
    async fn list_namespaces(&self) -> Result<Vec<NamespaceSummary>, ClientError> {
        let list: ItemList<Namespace> = self
            .get_json(self.kubectl(["get", "namespaces", "-o", "json"]), "namespaces")
            .await?;
        Ok(list.items.iter().map(NamespaceSummary::from).collect())
    }

    async fn get_workload_status(&self, name: &str, namespace: &str) -> Result<WorkloadStatus, ClientError> {
        let sts: StatefulSet = self
            .get_json(
                self.kubectl(["get", "statefulset", name, "-n", namespace, "-o", "json"]),
                &format!("statefulset {namespace}/{name}"),
            )
            .await?;
        Ok(WorkloadStatus::from(&sts))
    }

    async fn get_service(&self, name: &str, namespace: &str) -> Result<ServiceSnapshot, ClientError> {
        let svc: Service = self
            .get_json(
                self.kubectl(["get", "svc", name, "-n", namespace, "-o", "json"]),
                &format!("service {namespace}/{name}"),
            )
            .await?;
        Ok(ServiceSnapshot::from(&svc))
    }

    async fn get_secret_config(&self, secret: &str, namespace: &str) -> Result<String, ClientError> {
        let what = format!("secret {namespace}/{secret}");
        let template = format!("--template={{{{.data.{SECRET_CONFIG_KEY}}}}}");
        let output = self
            .inspect(
                self.kubectl(["get", "secret", secret, "-n", namespace, template.as_str()]),
                &what,
            )
            .await?;
        let value = stdout_text(&output, &what)?;
        let value = value.trim();
        Ok(if value == NO_VALUE { String::new() } else { value.to_string() })
    }

    async fn annotate_owner(&self, namespace: &str, owner: &str) -> Result<(), ClientError> {
        self.inspect(
            self.kubectl([
                "annotate".to_string(),
                "namespace".to_string(),
                namespace.to_string(),
                format!("{OWNER_ANNOTATION}={owner}"),
                "--overwrite".to_string(),
            ]),
            &format!("namespace {namespace}"),
        )
        .await?;
        Ok(())
    }

    async fn create_virtual_cluster(&self, name: &str, working_dir: &Path, expose: bool) -> Result<String, ClientError> {
        let mut args = vec![
            "create",
            name,
            "--config",
            CONFIG_FILE_NAME,
            "--connect=false",
            "--debug",
        ];
        if expose {
            args.push("--expose");
        }
        let output = self.execute(self.vcluster(args).in_dir(working_dir)).await?;
        Ok(output.combined())
    }

    async fn connect_virtual_cluster(&self, name: &str, namespace: &str) -> Result<Vec<u8>, ClientError> {
        let args = self.with_kubeconfig_flag(["connect", name, "--namespace", namespace, "--print"]);
        let output = self.execute(self.vcluster(args)).await?;
        Ok(output.stdout)
    }

    async fn delete_virtual_cluster(&self, name: &str) -> Result<String, ClientError> {
        let output = self
            .execute(self.vcluster(["delete", name, "--delete-namespace", "--yes"]))
            .await?;
        Ok(output.combined())
    }
}
