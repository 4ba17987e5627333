//! Inventory of virtual clusters.
//!
//! There is no store: every listing is rebuilt from the host's namespaces,
//! their owner annotation, and the control-plane workload and service of
//! each cluster.

use crate::error::ProvisionError;
use host_client::{HostClientTrait, NamespaceSummary};
use std::sync::Arc;
use tracing::{debug, info, warn};
use vcluster_types::{cluster_name_from_namespace, ClusterStatus, VirtualClusterRecord};

/// Lists the virtual clusters on the host visible to an identity.
pub struct InventoryBuilder {
    host: Arc<dyn HostClientTrait>,
}

impl InventoryBuilder {
    /// Builder reading namespaces and workloads from `host`.
    pub fn new(host: Arc<dyn HostClientTrait>) -> Self {
        Self { host }
    }

    /// Every virtual cluster `identity` may see.
    ///
    /// Only failing to enumerate namespaces is an error; a cluster whose
    /// details cannot be read is still listed, with what is known.
    pub async fn list(&self, identity: &str) -> Result<Vec<VirtualClusterRecord>, ProvisionError> {
        let namespaces = self.host.list_namespaces().await?;

        let mut records = Vec::new();
        for namespace in &namespaces {
            let Some(name) = cluster_name_from_namespace(&namespace.name) else {
                continue;
            };
            let record = self.record(name, namespace).await;
            if record.visible_to(identity) {
                records.push(record);
            } else {
                debug!(cluster = %name, owner = ?record.owner, identity = %identity, "hidden from identity");
            }
        }

        info!(identity = %identity, count = records.len(), "listed virtual clusters");
        Ok(records)
    }

    async fn record(&self, name: &str, namespace: &NamespaceSummary) -> VirtualClusterRecord {
        let mut record = VirtualClusterRecord::new(
            name,
            namespace.created_at.unwrap_or_default(),
            namespace.owner.clone(),
        );

        match self.host.get_workload_status(name, &namespace.name).await {
            Ok(workload) => {
                record.status = ClusterStatus::from_replicas(workload.desired, workload.ready);
                record.high_availability = workload.desired > 1;
            }
            Err(e) if e.is_not_found() => record.status = ClusterStatus::Pending,
            Err(e) => {
                warn!(cluster = %name, error = %e, "failed to read control-plane workload");
                record.status = ClusterStatus::Unknown;
            }
        }

        match self.host.get_service(name, &namespace.name).await {
            Ok(service) if service.is_load_balancer() => {
                record.externally_exposed = true;
                record.endpoint = service.external_endpoint().map(|e| e.uri());
            }
            Ok(_) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => warn!(cluster = %name, error = %e, "failed to read control-plane service"),
        }

        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;
    use host_client::{MockHostClient, MockOp, WorkloadStatus};

    fn builder(mock: &MockHostClient) -> InventoryBuilder {
        InventoryBuilder::new(Arc::new(mock.clone()))
    }

    #[tokio::test]
    async fn test_only_own_and_unowned_clusters_for_regular_identity() {
        let mock = MockHostClient::new();
        mock.add_namespace(namespace("vcluster-demo", Some("alice")));
        mock.add_namespace(namespace("vcluster-other", Some("bob")));
        mock.add_namespace(namespace("kube-system", None));

        let names: Vec<String> = builder(&mock)
            .list("alice")
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["demo"]);
    }

    #[tokio::test]
    async fn test_privileged_identities_see_all() {
        let mock = MockHostClient::new();
        mock.add_namespace(namespace("vcluster-demo", Some("alice")));
        mock.add_namespace(namespace("vcluster-other", Some("bob")));
        mock.add_namespace(namespace("vcluster-shared", None));

        for identity in ["admin", "default"] {
            assert_eq!(builder(&mock).list(identity).await.unwrap().len(), 3);
        }
        assert_eq!(builder(&mock).list("carol").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_status_and_exposure() {
        let mock = MockHostClient::new();
        mock.add_namespace(namespace("vcluster-ha", None));
        mock.add_namespace(namespace("vcluster-new", None));
        mock.add_namespace(namespace("vcluster-lb", None));
        mock.set_workload("vcluster-ha", WorkloadStatus::new(3, 3));
        mock.set_workload("vcluster-lb", WorkloadStatus::new(1, 0));
        mock.push_service("vcluster-ha", cluster_ip_service());
        mock.push_service("vcluster-lb", load_balancer_service(Some("203.0.113.9"), 443));

        let records = builder(&mock).list("default").await.unwrap();
        let ha = &records[0];
        assert_eq!(ha.status, ClusterStatus::Running);
        assert!(ha.high_availability);
        assert!(!ha.externally_exposed);
        assert_eq!(ha.namespace, "vcluster-ha");

        let new = &records[1];
        assert_eq!(new.status, ClusterStatus::Pending);
        assert!(!new.high_availability);

        let lb = &records[2];
        assert_eq!(lb.status, ClusterStatus::Pending);
        assert!(lb.externally_exposed);
        assert_eq!(lb.endpoint.as_deref(), Some("https://203.0.113.9"));
    }

    #[tokio::test]
    async fn test_load_balancer_without_ingress_has_no_endpoint() {
        let mock = MockHostClient::new();
        mock.add_namespace(namespace("vcluster-lb", None));
        mock.push_service("vcluster-lb", load_balancer_service(None, 443));

        let records = builder(&mock).list("default").await.unwrap();
        assert!(records[0].externally_exposed);
        assert_eq!(records[0].endpoint, None);
        // A single lookup, no polling
        assert_eq!(mock.call_count("get_service"), 1);
    }

    #[tokio::test]
    async fn test_lookup_failures_degrade_the_record() {
        let mock = MockHostClient::new();
        mock.add_namespace(namespace("vcluster-demo", Some("alice")));
        mock.fail(MockOp::GetWorkloadStatus);
        mock.fail(MockOp::GetService);

        let records = builder(&mock).list("alice").await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, ClusterStatus::Unknown);
        assert_eq!(records[0].owner.as_deref(), Some("alice"));
    }

    #[tokio::test]
    async fn test_namespace_listing_failure_is_an_error() {
        let mock = MockHostClient::new();
        mock.fail(MockOp::ListNamespaces);
        assert!(builder(&mock).list("alice").await.is_err());
    }
}
