//! vcluster Provisioner
//!
//! HTTP control plane for virtual clusters on a shared host cluster:
//! - Creates virtual clusters with `vcluster create` and returns their kubeconfig
//! - Serves live kubeconfigs and endpoints of existing clusters
//! - Lists the clusters visible to the calling identity
//! - Deletes clusters together with their namespace
//!
//! All cluster state lives on the host; the service keeps nothing in memory
//! between requests.

mod api;
mod config;
mod credentials;
mod endpoint;
mod error;
mod inventory;
mod kubeconfig;
mod orchestrator;
mod poll;

mod credentials_test;

#[cfg(test)]
mod test_utils;

use crate::api::AppState;
use crate::config::ServiceConfig;
use anyhow::Result;
use host_client::HostClient;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting vcluster Provisioner");

    let config = ServiceConfig::from_env()?;
    info!("Configuration:");
    info!("  Listen address: {}", config.listen_addr);
    info!("  Requests directory: {}", config.requests_dir.display());
    info!("  Mounted kubeconfig: {}", config.mounted_kubeconfig.display());
    info!("  kubectl: {}, vcluster: {}", config.kubectl_bin, config.vcluster_bin);
    info!("  Readiness delay: {:?}", config.policy.readiness_delay);

    tokio::fs::create_dir_all(&config.requests_dir).await?;

    let connector = Arc::new(HostClient::with_binaries(&config.kubectl_bin, &config.vcluster_bin, None));
    let shutdown = CancellationToken::new();
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    let app = api::router(AppState::new(config, connector, shutdown.clone()));

    info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for shutdown signal");
            }
            info!("Shutting down");
            shutdown.cancel();
        })
        .await?;

    Ok(())
}
