//! VirtualCluster declarative config
//!
//! The document handed to the provisioning CLI through `--config`.

use crate::namespace_for;
use serde::{Deserialize, Serialize};

/// Replica count of a single-instance control plane.
pub const SINGLE_REPLICA: u32 = 1;

/// Replica count of a high-availability control plane.
pub const HA_REPLICAS: u32 = 3;

/// Service type requested when a cluster is exposed externally.
pub const LOAD_BALANCER: &str = "LoadBalancer";

/// What a caller asked for when creating a virtual cluster.
///
/// Immutable once submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualClusterSpec {
    /// Cluster identity, also the namespace suffix
    pub name: String,
    /// Control-plane replicas (1 or 3)
    pub replica_count: u32,
    /// Expose the control plane through a load balancer
    pub expose_externally: bool,
}

impl VirtualClusterSpec {
    /// Build a spec from the request flags.
    #[must_use]
    pub fn new(name: impl Into<String>, high_availability: bool, expose_externally: bool) -> Self {
        Self {
            name: name.into(),
            replica_count: if high_availability { HA_REPLICAS } else { SINGLE_REPLICA },
            expose_externally,
        }
    }

    /// Whether this spec asks for a high-availability control plane.
    #[must_use]
    pub fn high_availability(&self) -> bool {
        self.replica_count > SINGLE_REPLICA
    }

    /// Host namespace the cluster will live in.
    #[must_use]
    pub fn namespace(&self) -> String {
        namespace_for(&self.name)
    }

    /// The declarative document for the provisioning CLI.
    #[must_use]
    pub fn to_config(&self) -> VirtualClusterConfig {
        VirtualClusterConfig {
            api_version: "v1".to_string(),
            kind: "VirtualCluster".to_string(),
            metadata: ConfigMetadata {
                name: self.name.clone(),
            },
            spec: ConfigSpec {
                replicas: self.replica_count,
                service: self.expose_externally.then(|| ServiceConfig {
                    service_type: LOAD_BALANCER.to_string(),
                }),
            },
        }
    }

    /// Render the declarative document as YAML.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(&self.to_config())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VirtualClusterConfig {
    pub api_version: String,
    pub kind: String,
    pub metadata: ConfigMetadata,
    pub spec: ConfigSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConfigMetadata {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConfigSpec {
    pub replicas: u32,

    /// Only present when the cluster is exposed externally
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<ServiceConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceConfig {
    #[serde(rename = "type")]
    pub service_type: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replicas_follow_ha_flag() {
        for name in ["demo", "a", "team-x-42"] {
            for lb in [false, true] {
                assert_eq!(VirtualClusterSpec::new(name, true, lb).to_config().spec.replicas, 3);
                assert_eq!(VirtualClusterSpec::new(name, false, lb).to_config().spec.replicas, 1);
            }
        }
    }

    #[test]
    fn test_plain_cluster_has_no_service_type() {
        let spec = VirtualClusterSpec::new("demo", false, false);
        let yaml = spec.to_yaml().unwrap();

        assert!(yaml.contains("kind: VirtualCluster"));
        assert!(yaml.contains("name: demo"));
        assert!(yaml.contains("replicas: 1"));
        assert!(!yaml.contains("service"));
        assert!(!yaml.contains("LoadBalancer"));
    }

    #[test]
    fn test_exposed_cluster_requests_load_balancer() {
        let spec = VirtualClusterSpec::new("demo", true, true);
        let parsed: VirtualClusterConfig = serde_yaml::from_str(&spec.to_yaml().unwrap()).unwrap();

        assert_eq!(parsed.api_version, "v1");
        assert_eq!(parsed.spec.replicas, 3);
        assert_eq!(
            parsed.spec.service,
            Some(ServiceConfig { service_type: "LoadBalancer".to_string() })
        );
        assert!(spec.high_availability());
        assert_eq!(spec.namespace(), "vcluster-demo");
    }
}
