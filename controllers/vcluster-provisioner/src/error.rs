//! Provisioner error types.
//!
//! One variant per failure class a request can end in. The HTTP status each
//! maps to lives in `api::error`.

use host_client::ClientError;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use vcluster_types::ValidationError;

/// Errors that can occur while provisioning, inspecting or deleting
/// virtual clusters.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// Malformed or missing request field
    #[error("{0}")]
    Input(String),

    /// Cluster name rejected
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// A host cluster call failed
    #[error("Host cluster error: {0}")]
    Client(#[from] ClientError),

    /// `vcluster create` exited non-zero
    #[error("vcluster create failed: {0}")]
    Create(#[source] ClientError),

    /// `vcluster delete` exited non-zero
    #[error("Error deleting vcluster: {0}")]
    Delete(#[source] ClientError),

    /// A bounded poll ran out of time
    #[error("timed out waiting for {what} after {after:?}")]
    Timeout { what: String, after: Duration },

    /// Neither `connect` nor the secret produced a kubeconfig in time
    #[error("timed out waiting for the kubeconfig of virtual cluster {0}")]
    CredentialTimeout(String),

    /// The requested object or document cannot be obtained right now
    #[error("Not found: {0}")]
    Unavailable(String),

    /// A kubeconfig could not be decoded, parsed or re-encoded
    #[error("Kubeconfig error: {0}")]
    Kubeconfig(String),

    /// The declarative config could not be written
    #[error("failed to write {}: {source}", path.display())]
    ConfigWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A poll observed its cancellation token
    #[error("{0} was cancelled")]
    Cancelled(String),

    /// Invalid start-up configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ProvisionError {
    /// Whether the error is a poll deadline rather than a failure.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::CredentialTimeout(_))
    }
}
