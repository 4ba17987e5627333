//! Endpoint resolution.
//!
//! Finds a reachable address for a virtual cluster's control-plane service.
//! The service carries the cluster's name and lives in its namespace.

use crate::error::ProvisionError;
use crate::poll::{poll_until, PollPolicy};
use host_client::{ClientError, HostClientTrait};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use vcluster_types::Endpoint;

/// Where to look for the address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveMode {
    /// Cluster IP and first port, single attempt
    Internal,
    /// Load-balancer ingress and first port, polled
    External,
}

/// Finds the address a virtual cluster's API server is reachable at.
pub struct EndpointResolver {
    host: Arc<dyn HostClientTrait>,
    policy: PollPolicy,
}

impl EndpointResolver {
    /// Resolver reading services from `host`. `policy` applies to
    /// [`ResolveMode::External`].
    pub fn new(host: Arc<dyn HostClientTrait>, policy: PollPolicy) -> Self {
        Self { host, policy }
    }

    pub async fn resolve(
        &self,
        name: &str,
        namespace: &str,
        mode: ResolveMode,
        cancel: &CancellationToken,
    ) -> Result<Endpoint, ProvisionError> {
        match mode {
            ResolveMode::Internal => self.internal(name, namespace).await,
            ResolveMode::External => self.external(name, namespace, cancel).await,
        }
    }

    /// Cluster IP of the service; fails at once when the service or its
    /// address is missing.
    pub async fn internal(&self, name: &str, namespace: &str) -> Result<Endpoint, ProvisionError> {
        let service = self.host.get_service(name, namespace).await.map_err(not_found_as_unavailable)?;
        service.internal_endpoint().ok_or_else(|| {
            ProvisionError::Unavailable(format!("internal address of service {namespace}/{name}"))
        })
    }

    /// Poll until the load balancer publishes an ingress address.
    pub async fn external(
        &self,
        name: &str,
        namespace: &str,
        cancel: &CancellationToken,
    ) -> Result<Endpoint, ProvisionError> {
        let host = self.host.as_ref();
        let endpoint = poll_until(
            &self.policy,
            &format!("external endpoint of {namespace}/{name}"),
            cancel,
            move |attempt| async move { lookup(host, name, namespace, attempt).await },
        )
        .await?;
        info!(cluster = %name, endpoint = %endpoint, "external endpoint resolved");
        Ok(endpoint)
    }

    /// Load-balanced clusters resolve externally, all others internally.
    pub async fn detect_mode(&self, name: &str, namespace: &str) -> Result<ResolveMode, ProvisionError> {
        let service = self.host.get_service(name, namespace).await.map_err(not_found_as_unavailable)?;
        if service.is_load_balancer() {
            Ok(ResolveMode::External)
        } else {
            Ok(ResolveMode::Internal)
        }
    }
}

async fn lookup(host: &dyn HostClientTrait, name: &str, namespace: &str, attempt: u32) -> Option<Endpoint> {
    match host.get_service(name, namespace).await {
        Ok(service) => {
            let endpoint = service.external_endpoint();
            if endpoint.is_none() {
                debug!(cluster = %name, attempt, "no ingress on service yet");
            }
            endpoint
        }
        Err(e) if e.is_not_found() => {
            debug!(cluster = %name, attempt, "service not created yet");
            None
        }
        Err(e) => {
            warn!(cluster = %name, attempt, error = %e, "service lookup failed");
            None
        }
    }
}

fn not_found_as_unavailable(e: ClientError) -> ProvisionError {
    match e {
        ClientError::NotFound(what) => ProvisionError::Unavailable(what),
        other => ProvisionError::Client(other),
    }
}
