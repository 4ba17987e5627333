//! Credential retrieval.
//!
//! Gets a virtual cluster's kubeconfig. `vcluster connect --print` is tried
//! first; its output is ready to use once the control plane is up. When it
//! keeps failing, the `vc-<name>` secret written by the provisioning CLI is
//! read and decoded instead.
//!
//! Two entry points:
//! - [`CredentialRetriever::fetch`] polls both sources, used right after
//!   creation, and writes the result to the request directory
//! - [`CredentialRetriever::fetch_live`] makes one attempt at each, used
//!   when a caller asks for an existing cluster's kubeconfig

use crate::config::ProvisioningPolicy;
use crate::endpoint::EndpointResolver;
use crate::error::ProvisionError;
use crate::kubeconfig::{decode_secret, rewrite_server};
use crate::poll::poll_until;
use host_client::HostClientTrait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use vcluster_types::{secret_name_for, Endpoint};

/// Directory, relative to the request directory, holding one subdirectory
/// per cluster.
pub const OUTPUT_DIR: &str = ".vcluster";
pub const OUTPUT_FILE: &str = "kubeconfig.yaml";

/// Where the kubeconfig of `name` is stored for a request.
pub fn kubeconfig_path(request_dir: &Path, name: &str) -> PathBuf {
    request_dir.join(OUTPUT_DIR).join(name).join(OUTPUT_FILE)
}

/// Obtains a virtual cluster's kubeconfig from the host.
pub struct CredentialRetriever {
    host: Arc<dyn HostClientTrait>,
    policy: ProvisioningPolicy,
}

impl CredentialRetriever {
    /// Retriever using `host` with the waits of `policy`.
    pub fn new(host: Arc<dyn HostClientTrait>, policy: ProvisioningPolicy) -> Self {
        Self { host, policy }
    }

    /// Poll for the kubeconfig of a freshly created cluster and store it at
    /// `output`.
    ///
    /// With `want_external`, the server address is rewritten to the
    /// load-balancer endpoint if one shows up in time; otherwise the
    /// document is kept as is.
    ///
    /// # Errors
    /// [`ProvisionError::CredentialTimeout`] when neither source produced a
    /// kubeconfig. Nothing is written in that case.
    pub async fn fetch(
        &self,
        name: &str,
        namespace: &str,
        want_external: bool,
        output: &Path,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, ProvisionError> {
        let doc = match self.poll_connect(name, namespace, cancel).await {
            Ok(doc) => {
                info!(cluster = %name, "kubeconfig obtained from vcluster connect");
                doc
            }
            Err(e) if e.is_timeout() => {
                warn!(cluster = %name, "vcluster connect did not succeed in time, reading secret");
                self.poll_secret(name, namespace, cancel).await.map_err(|e| {
                    if e.is_timeout() {
                        ProvisionError::CredentialTimeout(name.to_string())
                    } else {
                        e
                    }
                })?
            }
            Err(e) => return Err(e),
        };

        let doc = if want_external {
            self.with_external_endpoint(doc, name, namespace, cancel).await?
        } else {
            doc
        };

        store(output, &doc).await?;
        info!(cluster = %name, path = %output.display(), "kubeconfig stored");
        Ok(doc)
    }

    /// One attempt at each source for an existing cluster. Load-balanced
    /// clusters get their server rewritten when an ingress address is
    /// already published.
    ///
    /// # Errors
    /// * [`ProvisionError::Unavailable`] - no kubeconfig could be obtained
    /// * [`ProvisionError::Kubeconfig`] - the secret held undecodable data
    pub async fn fetch_live(&self, name: &str, namespace: &str) -> Result<Vec<u8>, ProvisionError> {
        let doc = match self.connect_once(name, namespace).await {
            Some(doc) => doc,
            None => self.secret_once(name, namespace).await?,
        };

        let service = match self.host.get_service(name, namespace).await {
            Ok(service) => service,
            Err(e) => {
                warn!(cluster = %name, error = %e, "could not check service type, kubeconfig left unchanged");
                return Ok(doc);
            }
        };
        if !service.is_load_balancer() {
            return Ok(doc);
        }
        match service.external_endpoint() {
            Some(endpoint) => Ok(rewrite_or_keep(doc, name, &endpoint)),
            None => {
                debug!(cluster = %name, "load balancer has no ingress yet, kubeconfig left unchanged");
                Ok(doc)
            }
        }
    }

    async fn poll_connect(
        &self,
        name: &str,
        namespace: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, ProvisionError> {
        let host = self.host.as_ref();
        poll_until(
            &self.policy.connect,
            &format!("vcluster connect {name}"),
            cancel,
            move |attempt| async move {
                match host.connect_virtual_cluster(name, namespace).await {
                    Ok(doc) if !is_blank(&doc) => Some(doc),
                    Ok(_) => {
                        debug!(cluster = %name, attempt, "vcluster connect printed nothing");
                        None
                    }
                    Err(e) => {
                        debug!(cluster = %name, attempt, error = %e, "vcluster connect not ready");
                        None
                    }
                }
            },
        )
        .await
    }

    async fn poll_secret(
        &self,
        name: &str,
        namespace: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, ProvisionError> {
        let host = self.host.as_ref();
        let secret = secret_name_for(name);
        let secret = secret.as_str();
        poll_until(
            &self.policy.secret,
            &format!("secret {namespace}/{secret}"),
            cancel,
            move |attempt| async move {
                match host.get_secret_config(secret, namespace).await {
                    Ok(value) if value.is_empty() => {
                        debug!(secret = %secret, attempt, "secret exists but data is empty");
                        None
                    }
                    Ok(value) => match decode_secret(&value) {
                        Ok(doc) if !is_blank(&doc) => Some(doc),
                        Ok(_) => {
                            debug!(secret = %secret, attempt, "secret decoded to an empty document");
                            None
                        }
                        Err(e) => {
                            warn!(secret = %secret, attempt, error = %e, "secret data not decodable yet");
                            None
                        }
                    },
                    Err(e) if e.is_not_found() => {
                        debug!(secret = %secret, attempt, "secret not created yet");
                        None
                    }
                    Err(e) => {
                        warn!(secret = %secret, attempt, error = %e, "failed to read secret");
                        None
                    }
                }
            },
        )
        .await
    }

    async fn with_external_endpoint(
        &self,
        doc: Vec<u8>,
        name: &str,
        namespace: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, ProvisionError> {
        let resolver = EndpointResolver::new(Arc::clone(&self.host), self.policy.endpoint);
        match resolver.external(name, namespace, cancel).await {
            Ok(endpoint) => Ok(rewrite_or_keep(doc, name, &endpoint)),
            Err(e @ ProvisionError::Cancelled(_)) => Err(e),
            Err(e) => {
                warn!(cluster = %name, error = %e, "no external endpoint, kubeconfig left unchanged");
                Ok(doc)
            }
        }
    }

    async fn connect_once(&self, name: &str, namespace: &str) -> Option<Vec<u8>> {
        match self.host.connect_virtual_cluster(name, namespace).await {
            Ok(doc) if !is_blank(&doc) => Some(doc),
            Ok(_) => None,
            Err(e) => {
                debug!(cluster = %name, error = %e, "vcluster connect failed, reading secret");
                None
            }
        }
    }

    async fn secret_once(&self, name: &str, namespace: &str) -> Result<Vec<u8>, ProvisionError> {
        let secret = secret_name_for(name);
        let value = self
            .host
            .get_secret_config(&secret, namespace)
            .await
            .map_err(|e| ProvisionError::Unavailable(format!("kubeconfig of {name}: {e}")))?;
        if value.is_empty() {
            return Err(ProvisionError::Unavailable(format!("kubeconfig secret {secret} is empty")));
        }
        let doc = decode_secret(&value)?;
        if is_blank(&doc) {
            return Err(ProvisionError::Unavailable(format!("kubeconfig secret {secret} is empty")));
        }
        Ok(doc)
    }
}

fn rewrite_or_keep(doc: Vec<u8>, name: &str, endpoint: &Endpoint) -> Vec<u8> {
    match rewrite_server(&doc, endpoint) {
        Ok(rewritten) => {
            info!(cluster = %name, endpoint = %endpoint, "kubeconfig server rewritten");
            rewritten
        }
        Err(e) => {
            warn!(cluster = %name, error = %e, "could not rewrite kubeconfig server, left unchanged");
            doc
        }
    }
}

fn is_blank(doc: &[u8]) -> bool {
    doc.iter().all(u8::is_ascii_whitespace)
}

/// Write `doc` to `path`, creating parent directories.
async fn store(path: &Path, doc: &[u8]) -> Result<(), ProvisionError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, doc).await?;
    Ok(())
}
