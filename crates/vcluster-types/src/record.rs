//! VirtualClusterRecord
//!
//! The presentable view of one virtual cluster, rebuilt on every listing.

use crate::{namespace_for, PRIVILEGED_IDENTITIES};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Observed state of a virtual cluster's control plane.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum ClusterStatus {
    /// Control plane not (yet) fully ready, or not created yet
    Pending,
    /// Every desired control-plane replica is ready
    Running,
    /// Status could not be determined
    #[default]
    Unknown,
}

impl ClusterStatus {
    /// Derive the status from a stateful workload's replica counts.
    ///
    /// Running only when all desired replicas are ready and at least one is
    /// desired.
    #[must_use]
    pub fn from_replicas(desired: i32, ready: i32) -> Self {
        if desired > 0 && ready == desired {
            Self::Running
        } else {
            Self::Pending
        }
    }
}

impl std::fmt::Display for ClusterStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "Pending"),
            Self::Running => write!(f, "Running"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VirtualClusterRecord {
    pub name: String,

    /// Always `vcluster-<name>`
    pub namespace: String,

    pub status: ClusterStatus,

    #[serde(rename = "ha")]
    pub high_availability: bool,

    #[serde(rename = "loadBalancer")]
    pub externally_exposed: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    pub created_at: DateTime<Utc>,

    /// Identity recorded in the namespace's owner annotation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
}

impl VirtualClusterRecord {
    /// A record with nothing known beyond the namespace.
    #[must_use]
    pub fn new(name: &str, created_at: DateTime<Utc>, owner: Option<String>) -> Self {
        Self {
            name: name.to_string(),
            namespace: namespace_for(name),
            status: ClusterStatus::Unknown,
            high_availability: false,
            externally_exposed: false,
            endpoint: None,
            created_at,
            owner,
        }
    }

    /// Ownership visibility rule.
    ///
    /// Privileged identities see everything; anyone else sees unowned
    /// records and their own.
    #[must_use]
    pub fn visible_to(&self, identity: &str) -> bool {
        PRIVILEGED_IDENTITIES.contains(&identity)
            || match self.owner.as_deref() {
                None | Some("") => true,
                Some(owner) => owner == identity,
            }
    }
}
