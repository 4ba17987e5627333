//! Test utilities for unit testing the provisioner
//!
//! This module provides helpers for creating host objects and fast poll
//! schedules so the provisioning flow can run against `MockHostClient` in
//! milliseconds.

use crate::config::ProvisioningPolicy;
use crate::poll::PollPolicy;
use base64::Engine;
use chrono::{TimeZone, Utc};
use host_client::{IngressPoint, NamespaceSummary, ServiceSnapshot};
use std::time::Duration;

/// A kubeconfig as printed by `vcluster connect --print`
pub const SAMPLE_KUBECONFIG: &str = r#"apiVersion: v1
kind: Config
clusters:
- name: vcluster_demo_vcluster-demo
  cluster:
    server: https://localhost:8443
    certificate-authority-data: LS0tLS1CRUdJTg==
contexts:
- name: vcluster_demo_vcluster-demo
  context:
    cluster: vcluster_demo_vcluster-demo
    user: vcluster_demo_vcluster-demo
current-context: vcluster_demo_vcluster-demo
users:
- name: vcluster_demo_vcluster-demo
  user:
    client-certificate-data: LS0tLS1DRVJU
"#;

/// Poll schedules shrunk to milliseconds, no readiness delay
pub fn fast_policy() -> ProvisioningPolicy {
    let poll = PollPolicy::new(Duration::from_millis(2), Duration::from_millis(40));
    ProvisioningPolicy {
        connect: poll,
        secret: poll,
        endpoint: poll,
        readiness_delay: Duration::ZERO,
    }
}

/// Helper to create a namespace with an optional owner annotation
pub fn namespace(name: &str, owner: Option<&str>) -> NamespaceSummary {
    let created = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).single();
    let ns = NamespaceSummary::new(name, created);
    match owner {
        Some(owner) => ns.with_owner(owner),
        None => ns,
    }
}

/// Helper to create a ClusterIP control-plane service
pub fn cluster_ip_service() -> ServiceSnapshot {
    ServiceSnapshot {
        service_type: "ClusterIP".to_string(),
        cluster_ip: Some("10.96.0.20".to_string()),
        ports: vec![443],
        ingress: Vec::new(),
    }
}

/// Helper to create a LoadBalancer service, with an ingress IP once one is
/// published
pub fn load_balancer_service(ip: Option<&str>, port: i32) -> ServiceSnapshot {
    ServiceSnapshot {
        service_type: "LoadBalancer".to_string(),
        cluster_ip: Some("10.96.0.20".to_string()),
        ports: vec![port],
        ingress: ip
            .map(|ip| {
                vec![IngressPoint {
                    ip: Some(ip.to_string()),
                    hostname: None,
                }]
            })
            .unwrap_or_default(),
    }
}

/// Base64 of `doc`, the way the credentials secret stores it
pub fn encode(doc: &str) -> String {
    base64::engine::general_purpose::STANDARD.encode(doc)
}
