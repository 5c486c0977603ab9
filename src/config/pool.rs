//! Connection pool configuration
//!
//! Defines where a pool dials, what it tunnels to, and how it bounds
//! concurrency and latency.

use super::{ProxyConfig, TcpConfig};
use crate::pool::PoolKey;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default maximum number of checked-out sockets
fn default_max_size() -> usize {
    10
}

/// Default connect timeout in seconds
fn default_connect_timeout() -> f64 {
    10.0
}

/// Default network (handshake) timeout in seconds
fn default_network_timeout() -> f64 {
    10.0
}

/// Default wait-for-slot timeout in seconds
fn default_acquire_timeout() -> f64 {
    10.0
}

/// Default liveness probe bound in milliseconds
fn default_probe_timeout_ms() -> u64 {
    5
}

/// What `acquire` does when every slot is checked out
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExhaustionPolicy {
    /// Wait for a release, up to `acquire_timeout`
    #[default]
    #[serde(rename = "block")]
    Block,
    /// Fail immediately
    #[serde(rename = "fail_fast")]
    FailFast,
}

/// Connection pool configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PoolConfig {
    /// Host the pool dials when proxying
    #[serde(default)]
    pub proxy_host: String,

    /// Port the pool dials when proxying
    #[serde(default)]
    pub proxy_port: u16,

    /// Logical target host, also the CONNECT destination
    pub request_host: String,

    /// Logical target port, also the CONNECT destination
    pub request_port: u16,

    /// Tunnel through the proxy with CONNECT
    #[serde(default)]
    pub use_proxy: bool,

    /// Maximum number of sockets checked out at once
    #[serde(default = "default_max_size")]
    pub max_size: usize,

    /// TCP connect timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: f64,

    /// Proxy handshake timeout in seconds
    #[serde(default = "default_network_timeout")]
    pub network_timeout: f64,

    /// Maximum time to wait for a free slot, in seconds
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout: f64,

    /// Behavior when the pool is exhausted
    #[serde(default)]
    pub exhaustion: ExhaustionPolicy,

    /// Upper bound on the idle-socket liveness probe, in milliseconds
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    /// Socket options for dialed connections
    #[serde(default)]
    pub tcp: TcpConfig,

    /// CONNECT request settings
    #[serde(default)]
    pub proxy: ProxyConfig,
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig {
            proxy_host: String::new(),
            proxy_port: 0,
            request_host: String::new(),
            request_port: 0,
            use_proxy: false,
            max_size: default_max_size(),
            connect_timeout: default_connect_timeout(),
            network_timeout: default_network_timeout(),
            acquire_timeout: default_acquire_timeout(),
            exhaustion: ExhaustionPolicy::default(),
            probe_timeout_ms: default_probe_timeout_ms(),
            tcp: TcpConfig::default(),
            proxy: ProxyConfig::default(),
        }
    }
}

fn secs(value: f64, fallback: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or_else(|_| Duration::from_secs_f64(fallback))
}

impl PoolConfig {
    /// Configuration for a direct (non-proxied) pool
    pub fn direct(request_host: &str, request_port: u16) -> Self {
        PoolConfig {
            request_host: request_host.to_string(),
            request_port,
            ..Default::default()
        }
    }

    /// Configuration for a pool tunneling through a proxy
    pub fn proxied(proxy_host: &str, proxy_port: u16, request_host: &str, request_port: u16) -> Self {
        PoolConfig {
            proxy_host: proxy_host.to_string(),
            proxy_port,
            use_proxy: true,
            ..Self::direct(request_host, request_port)
        }
    }

    /// The identity sockets of this pool are grouped under
    pub fn key(&self) -> PoolKey {
        PoolKey::new(&self.request_host, self.request_port)
    }

    /// The `host:port` the pool actually dials
    pub fn endpoint(&self) -> String {
        if self.use_proxy {
            join_host_port(&self.proxy_host, self.proxy_port)
        } else {
            join_host_port(&self.request_host, self.request_port)
        }
    }

    /// Get the connect timeout
    pub fn connect_timeout(&self) -> Duration {
        secs(self.connect_timeout, default_connect_timeout())
    }

    /// Get the handshake timeout
    pub fn network_timeout(&self) -> Duration {
        secs(self.network_timeout, default_network_timeout())
    }

    /// Get the wait-for-slot timeout
    pub fn acquire_timeout(&self) -> Duration {
        secs(self.acquire_timeout, default_acquire_timeout())
    }

    /// Get the liveness probe bound
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    /// Validate the pool configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_size == 0 {
            return Err("max_size must be greater than 0".to_string());
        }
        if self.request_host.is_empty() {
            return Err("request_host must not be empty".to_string());
        }
        if self.request_port == 0 {
            return Err("request_port must not be 0".to_string());
        }
        if self.use_proxy {
            if self.proxy_host.is_empty() {
                return Err("proxy_host must not be empty when use_proxy is set".to_string());
            }
            if self.proxy_port == 0 {
                return Err("proxy_port must not be 0 when use_proxy is set".to_string());
            }
        }
        for (name, value) in [
            ("connect_timeout", self.connect_timeout),
            ("network_timeout", self.network_timeout),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(format!("{} must be a positive number of seconds", name));
            }
        }
        if !self.acquire_timeout.is_finite() || self.acquire_timeout < 0.0 {
            return Err("acquire_timeout must not be negative".to_string());
        }
        Ok(())
    }
}

/// Join host and port, bracketing IPv6 literals
pub fn join_host_port(host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}
