//! Control-plane endpoints

use serde::{Deserialize, Serialize};

/// Port that is left implicit in an `https` URI.
pub const DEFAULT_HTTPS_PORT: i32 = 443;

/// A reachable address of a virtual cluster's control-plane service.
///
/// Derived from the host service on demand, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// IP address or hostname
    pub host: String,
    pub port: i32,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: i32) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Canonical `https` URI; port 443 is omitted.
    #[must_use]
    pub fn uri(&self) -> String {
        if self.port == DEFAULT_HTTPS_PORT {
            format!("https://{}", self.host)
        } else {
            format!("https://{}:{}", self.host, self.port)
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.uri())
    }
}
