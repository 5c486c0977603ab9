//! Transport configuration types
//!
//! Socket options for dialed connections and the CONNECT request settings.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default keepalive seconds
fn default_keepalive_secs() -> u64 {
    20
}

/// Default keepalive interval
fn default_keepalive_interval() -> u64 {
    8
}

fn default_nodelay() -> bool {
    true
}

/// TCP transport configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TcpConfig {
    /// Enable TCP_NODELAY
    #[serde(default = "default_nodelay")]
    pub nodelay: bool,

    /// TCP keepalive timeout in seconds
    #[serde(default = "default_keepalive_secs")]
    pub keepalive_secs: u64,

    /// TCP keepalive interval in seconds
    #[serde(default = "default_keepalive_interval")]
    pub keepalive_interval: u64,
}

impl Default for TcpConfig {
    fn default() -> Self {
        TcpConfig {
            nodelay: default_nodelay(),
            keepalive_secs: default_keepalive_secs(),
            keepalive_interval: default_keepalive_interval(),
        }
    }
}

/// CONNECT request configuration
///
/// Extra headers are sent verbatim after `Host`. This is where proxy
/// credentials go, e.g. a `Proxy-Authorization` header.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ProxyConfig {
    /// Additional request headers for the CONNECT request
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl ProxyConfig {
    /// Headers as name/value pairs, in a stable order
    pub fn header_pairs(&self) -> Vec<(String, String)> {
        self.headers
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }
}
