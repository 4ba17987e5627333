//! Service configuration.
//!
//! Read once from environment variables at start-up.

use crate::error::ProvisionError;
use crate::poll::PollPolicy;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8081";
pub const DEFAULT_REQUESTS_DIR: &str = "./requests";
pub const DEFAULT_MOUNTED_KUBECONFIG: &str = "/var/secrets/kubeconfig";
pub const DEFAULT_READINESS_DELAY_SECS: u64 = 60;

/// Every wait of the provisioning flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProvisioningPolicy {
    /// `vcluster connect --print` attempts
    pub connect: PollPolicy,
    /// Credentials secret reads
    pub secret: PollPolicy,
    /// Load-balancer ingress lookups
    pub endpoint: PollPolicy,
    /// Unconditional grace period between create and the first poll
    pub readiness_delay: Duration,
}

impl Default for ProvisioningPolicy {
    fn default() -> Self {
        Self {
            connect: PollPolicy::new(Duration::from_secs(10), Duration::from_secs(3 * 60)),
            secret: PollPolicy::new(Duration::from_secs(15), Duration::from_secs(2 * 60)),
            endpoint: PollPolicy::new(Duration::from_secs(10), Duration::from_secs(3 * 60)),
            readiness_delay: Duration::from_secs(DEFAULT_READINESS_DELAY_SECS),
        }
    }
}

/// Provisioner configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub listen_addr: SocketAddr,
    /// Root of the per-request working directories
    pub requests_dir: PathBuf,
    /// Host credentials mounted from a secret
    pub mounted_kubeconfig: PathBuf,
    pub kubectl_bin: String,
    pub vcluster_bin: String,
    pub policy: ProvisioningPolicy,
}

impl ServiceConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ProvisionError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup`, which returns the value of a
    /// variable if it is set.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ProvisionError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let listen_addr = var("LISTEN_ADDR", DEFAULT_LISTEN_ADDR);
        let listen_addr: SocketAddr = listen_addr.parse().map_err(|e| {
            ProvisionError::InvalidConfig(format!("LISTEN_ADDR '{listen_addr}': {e}"))
        })?;

        let delay = var("READINESS_DELAY_SECS", &DEFAULT_READINESS_DELAY_SECS.to_string());
        let delay: u64 = delay.parse().map_err(|e| {
            ProvisionError::InvalidConfig(format!("READINESS_DELAY_SECS '{delay}': {e}"))
        })?;

        Ok(Self {
            listen_addr,
            requests_dir: PathBuf::from(var("REQUESTS_DIR", DEFAULT_REQUESTS_DIR)),
            mounted_kubeconfig: PathBuf::from(var("MOUNTED_KUBECONFIG", DEFAULT_MOUNTED_KUBECONFIG)),
            kubectl_bin: var("KUBECTL_BIN", "kubectl"),
            vcluster_bin: var("VCLUSTER_BIN", "vcluster"),
            policy: ProvisioningPolicy {
                readiness_delay: Duration::from_secs(delay),
                ..ProvisioningPolicy::default()
            },
        })
    }

    /// Host credentials for creating a cluster: the uploaded file, else the
    /// mounted secret, else `None` for the in-cluster default.
    pub fn create_credentials(&self, uploaded: Option<PathBuf>) -> Option<PathBuf> {
        uploaded.or_else(|| self.mounted())
    }

    /// Host credentials for reading: the mounted secret, else the user's
    /// `~/.kube/config`, else `None` for the in-cluster default.
    pub fn read_credentials(&self) -> Option<PathBuf> {
        self.mounted().or_else(|| {
            dirs::home_dir()
                .map(|home| home.join(".kube").join("config"))
                .filter(|p| p.exists())
        })
    }

    fn mounted(&self) -> Option<PathBuf> {
        Some(self.mounted_kubeconfig.clone()).filter(|p| p.exists())
    }

    /// Working directory of request `request_id`
    pub fn request_dir(&self, request_id: &str) -> PathBuf {
        self.requests_dir.join(request_id)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8081)),
            requests_dir: PathBuf::from(DEFAULT_REQUESTS_DIR),
            mounted_kubeconfig: PathBuf::from(DEFAULT_MOUNTED_KUBECONFIG),
            kubectl_bin: "kubectl".to_string(),
            vcluster_bin: "vcluster".to_string(),
            policy: ProvisioningPolicy::default(),
        }
    }
}
