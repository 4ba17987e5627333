//! Host cluster client
//!
//! Drives the two management tools kubehatch depends on, kubectl and the
//! vcluster CLI, and decodes what they print into typed snapshots.
//!
//! # Example
//!
//! ```no_run
//! use host_client::{HostClient, HostClientTrait};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = HostClient::with_binaries("kubectl", "vcluster", None);
//!
//! // Namespaces, with their owner annotation
//! for ns in client.list_namespaces().await? {
//!     println!("{} owned by {:?}", ns.name, ns.owner);
//! }
//!
//! // Control-plane workload of virtual cluster "demo"
//! let status = client.get_workload_status("demo", "vcluster-demo").await?;
//! println!("{}/{} ready", status.ready, status.desired);
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - **Command execution**: one subprocess per call, environment filtered per tool
//! - **Resource inspection**: namespaces, stateful workloads, services, secrets
//! - **Provisioning**: `vcluster create`, `connect --print` and `delete`
//! - **Mocks**: `MockHostClient` and `MockCommandRunner` behind `test-util`

pub mod client;
pub mod error;
pub mod exec;
pub mod models;
#[path = "trait.rs"]
pub mod host_trait;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;

pub use client::{HostClient, CONFIG_FILE_NAME};
pub use error::ClientError;
pub use exec::{filter_env, CommandOutput, CommandRunner, Invocation, ProcessRunner, Tool, CLUSTER_ENV_KEYS};
pub use host_trait::{HostClientTrait, HostConnector};
pub use models::*;
#[cfg(any(test, feature = "test-util"))]
pub use mock::{CreateCall, MockCommandRunner, MockHostClient, MockOp};
