//! kubehatch data model
//!
//! Types shared by the host client and the provisioning service.
//!
//! Nothing here is persisted by kubehatch itself: records are rebuilt from
//! the host cluster's live objects on every read, and the declarative config
//! is only written so the provisioning CLI can consume it.

pub mod endpoint;
pub mod record;
pub mod validate;
pub mod virtual_cluster;

pub use endpoint::*;
pub use record::*;
pub use validate::*;
pub use virtual_cluster::*;

/// Prefix of every namespace that hosts a virtual cluster.
pub const NAMESPACE_PREFIX: &str = "vcluster-";

/// Prefix of the secret the provisioning CLI stores the kubeconfig in.
pub const SECRET_PREFIX: &str = "vc-";

/// Key holding the kubeconfig inside the credentials secret.
pub const SECRET_CONFIG_KEY: &str = "config";

/// Namespace annotation recording who created a virtual cluster.
pub const OWNER_ANNOTATION: &str = "kubehatch.io/owner";

/// Identities allowed to see every virtual cluster.
pub const PRIVILEGED_IDENTITIES: [&str; 2] = ["default", "admin"];

/// Identity used when a request carries no identity at all.
pub const DEFAULT_IDENTITY: &str = "default";

/// Namespace hosting the virtual cluster `name`.
#[must_use]
pub fn namespace_for(name: &str) -> String {
    format!("{NAMESPACE_PREFIX}{name}")
}

/// Name of the secret holding the kubeconfig of virtual cluster `name`.
#[must_use]
pub fn secret_name_for(name: &str) -> String {
    format!("{SECRET_PREFIX}{name}")
}

/// Inverse of [`namespace_for`]. Returns `None` for namespaces that do not
/// host a virtual cluster.
#[must_use]
pub fn cluster_name_from_namespace(namespace: &str) -> Option<&str> {
    namespace
        .strip_prefix(NAMESPACE_PREFIX)
        .filter(|name| !name.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespace_round_trip() {
        assert_eq!(namespace_for("demo"), "vcluster-demo");
        assert_eq!(cluster_name_from_namespace("vcluster-demo"), Some("demo"));
    }

    #[test]
    fn test_foreign_namespaces_are_ignored() {
        assert_eq!(cluster_name_from_namespace("kube-system"), None);
        assert_eq!(cluster_name_from_namespace("vcluster-"), None);
        assert_eq!(cluster_name_from_namespace("my-vcluster-demo"), None);
    }

    #[test]
    fn test_secret_name() {
        assert_eq!(secret_name_for("demo"), "vc-demo");
    }
}
