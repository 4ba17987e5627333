//! Kubeconfig handling.
//!
//! Documents are decoded into `kube`'s typed [`Kubeconfig`]; the only field
//! ever changed is `clusters[].cluster.server`.

use crate::error::ProvisionError;
use base64::Engine;
use kube::config::Kubeconfig;
use vcluster_types::Endpoint;

/// Parse a kubeconfig document.
pub fn parse(doc: &[u8]) -> Result<Kubeconfig, ProvisionError> {
    let text = std::str::from_utf8(doc)
        .map_err(|e| ProvisionError::Kubeconfig(format!("invalid kubeconfig UTF-8: {e}")))?;
    serde_yaml::from_str(text)
        .map_err(|e| ProvisionError::Kubeconfig(format!("invalid kubeconfig YAML: {e}")))
}

/// Server address of every cluster entry, in document order.
pub fn servers(kubeconfig: &Kubeconfig) -> Vec<&str> {
    kubeconfig
        .clusters
        .iter()
        .filter_map(|c| c.cluster.as_ref())
        .filter_map(|c| c.server.as_deref())
        .collect()
}

/// Point every cluster entry of `doc` at `endpoint`.
///
/// Rewriting a document twice with the same endpoint gives the same bytes
/// as rewriting it once.
pub fn rewrite_server(doc: &[u8], endpoint: &Endpoint) -> Result<Vec<u8>, ProvisionError> {
    let mut kubeconfig = parse(doc)?;
    let server = endpoint.uri();
    for cluster in kubeconfig.clusters.iter_mut().filter_map(|c| c.cluster.as_mut()) {
        cluster.server = Some(server.clone());
    }
    serde_yaml::to_string(&kubeconfig)
        .map(String::into_bytes)
        .map_err(|e| ProvisionError::Kubeconfig(format!("failed to encode kubeconfig: {e}")))
}

/// Decode the base64 value of the credentials secret.
pub fn decode_secret(value: &str) -> Result<Vec<u8>, ProvisionError> {
    base64::engine::general_purpose::STANDARD
        .decode(value.trim())
        .map_err(|e| ProvisionError::Kubeconfig(format!("failed to decode kubeconfig secret: {e}")))
}
