//! Typed snapshots of host cluster objects
//!
//! kubectl prints objects as JSON; they are decoded into the `k8s-openapi`
//! types and reduced to the handful of fields kubehatch reads.

use chrono::{DateTime, Utc};
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::{Namespace, Service};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use serde::{Deserialize, Serialize};
use vcluster_types::{Endpoint, LOAD_BALANCER, OWNER_ANNOTATION};

/// `kubectl get <kind> -o json` output for a collection.
#[derive(Debug, Clone, Deserialize)]
pub struct ItemList<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
}

/// A namespace with the metadata the inventory needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceSummary {
    pub name: String,
    pub created_at: Option<DateTime<Utc>>,
    /// Value of the owner annotation, if any
    pub owner: Option<String>,
}

impl NamespaceSummary {
    pub fn new(name: impl Into<String>, created_at: Option<DateTime<Utc>>) -> Self {
        Self {
            name: name.into(),
            created_at,
            owner: None,
        }
    }

    #[must_use]
    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }
}

impl From<&Namespace> for NamespaceSummary {
    fn from(ns: &Namespace) -> Self {
        let owner = ns
            .metadata
            .annotations
            .as_ref()
            .and_then(|a| a.get(OWNER_ANNOTATION))
            .filter(|o| !o.is_empty())
            .cloned();
        Self {
            name: ns.metadata.name.clone().unwrap_or_default(),
            created_at: ns.metadata.creation_timestamp.as_ref().and_then(to_utc),
            owner,
        }
    }
}

/// Convert through the wire form so the conversion does not depend on the
/// date library backing `Time`.
fn to_utc(time: &Time) -> Option<DateTime<Utc>> {
    let value = serde_json::to_value(time).ok()?;
    DateTime::parse_from_rfc3339(value.as_str()?)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Replica counts of a stateful workload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadStatus {
    pub desired: i32,
    pub ready: i32,
}

impl WorkloadStatus {
    pub fn new(desired: i32, ready: i32) -> Self {
        Self { desired, ready }
    }
}

impl From<&StatefulSet> for WorkloadStatus {
    fn from(sts: &StatefulSet) -> Self {
        Self {
            desired: sts.spec.as_ref().and_then(|s| s.replicas).unwrap_or(1),
            ready: sts
                .status
                .as_ref()
                .and_then(|s| s.ready_replicas)
                .unwrap_or(0),
        }
    }
}

/// One load-balancer ingress point.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngressPoint {
    pub ip: Option<String>,
    pub hostname: Option<String>,
}

impl IngressPoint {
    /// The IP if set, else the hostname.
    #[must_use]
    pub fn address(&self) -> Option<&str> {
        self.ip
            .as_deref()
            .filter(|ip| !ip.is_empty())
            .or_else(|| self.hostname.as_deref().filter(|h| !h.is_empty()))
    }
}

/// A service's type, ports and addresses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSnapshot {
    /// `ClusterIP`, `NodePort` or `LoadBalancer`
    pub service_type: String,
    pub cluster_ip: Option<String>,
    /// Declared ports, in declaration order
    pub ports: Vec<i32>,
    pub ingress: Vec<IngressPoint>,
}

impl ServiceSnapshot {
    #[must_use]
    pub fn is_load_balancer(&self) -> bool {
        self.service_type == LOAD_BALANCER
    }

    /// The first declared port.
    #[must_use]
    pub fn first_port(&self) -> Option<i32> {
        self.ports.first().copied()
    }

    /// First populated ingress address paired with the first port.
    #[must_use]
    pub fn external_endpoint(&self) -> Option<Endpoint> {
        let port = self.first_port()?;
        self.ingress
            .iter()
            .find_map(IngressPoint::address)
            .map(|host| Endpoint::new(host, port))
    }

    /// Cluster IP paired with the first port.
    #[must_use]
    pub fn internal_endpoint(&self) -> Option<Endpoint> {
        let port = self.first_port()?;
        self.cluster_ip
            .as_deref()
            .filter(|ip| !ip.is_empty() && *ip != "None")
            .map(|ip| Endpoint::new(ip, port))
    }
}

impl From<&Service> for ServiceSnapshot {
    fn from(svc: &Service) -> Self {
        let spec = svc.spec.as_ref();
        let ingress = svc
            .status
            .as_ref()
            .and_then(|s| s.load_balancer.as_ref())
            .and_then(|lb| lb.ingress.as_ref())
            .map(|points| {
                points
                    .iter()
                    .map(|p| IngressPoint {
                        ip: p.ip.clone(),
                        hostname: p.hostname.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        Self {
            service_type: spec
                .and_then(|s| s.type_.clone())
                .unwrap_or_else(|| "ClusterIP".to_string()),
            cluster_ip: spec.and_then(|s| s.cluster_ip.clone()),
            ports: spec
                .and_then(|s| s.ports.as_ref())
                .map(|ports| ports.iter().map(|p| p.port).collect())
                .unwrap_or_default(),
            ingress,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespace_summary_from_json() {
        let ns: Namespace = serde_json::from_str(
            r#"{
                "metadata": {
                    "name": "vcluster-demo",
                    "creationTimestamp": "2024-05-01T10:00:00Z",
                    "annotations": {"kubehatch.io/owner": "alice"}
                }
            }"#,
        )
        .unwrap();
        let summary = NamespaceSummary::from(&ns);
        assert_eq!(summary.name, "vcluster-demo");
        assert_eq!(summary.owner.as_deref(), Some("alice"));
        assert_eq!(
            summary.created_at.unwrap().to_rfc3339(),
            "2024-05-01T10:00:00+00:00"
        );
    }

    #[test]
    fn test_workload_status_defaults() {
        let sts: StatefulSet = serde_json::from_str(
            r#"{"spec": {"replicas": 3, "selector": {}, "serviceName": "demo", "template": {}}, "status": {"replicas": 3, "readyReplicas": 2}}"#,
        )
        .unwrap();
        assert_eq!(WorkloadStatus::from(&sts), WorkloadStatus::new(3, 2));

        let bare: StatefulSet = serde_json::from_str(r#"{"metadata": {"name": "demo"}}"#).unwrap();
        assert_eq!(WorkloadStatus::from(&bare), WorkloadStatus::new(1, 0));
    }

    #[test]
    fn test_service_snapshot_endpoints() {
        let svc: Service = serde_json::from_str(
            r#"{
                "spec": {"type": "LoadBalancer", "clusterIP": "10.96.4.2",
                         "ports": [{"port": 443}, {"port": 8443}]},
                "status": {"loadBalancer": {"ingress": [{"hostname": "lb.example.com"}]}}
            }"#,
        )
        .unwrap();
        let snapshot = ServiceSnapshot::from(&svc);
        assert!(snapshot.is_load_balancer());
        assert_eq!(snapshot.external_endpoint().unwrap().uri(), "https://lb.example.com");
        assert_eq!(snapshot.internal_endpoint().unwrap().uri(), "https://10.96.4.2");
    }

    #[test]
    fn test_ingress_prefers_ip() {
        let point = IngressPoint {
            ip: Some("203.0.113.7".to_string()),
            hostname: Some("lb.example.com".to_string()),
        };
        assert_eq!(point.address(), Some("203.0.113.7"));
        assert_eq!(IngressPoint::default().address(), None);
    }

    #[test]
    fn test_service_without_ingress_or_ports() {
        let svc: Service = serde_json::from_str(r#"{"spec": {"clusterIP": "10.96.0.9"}}"#).unwrap();
        let snapshot = ServiceSnapshot::from(&svc);
        assert_eq!(snapshot.service_type, "ClusterIP");
        assert!(snapshot.external_endpoint().is_none());
        assert!(snapshot.internal_endpoint().is_none());
    }
}
