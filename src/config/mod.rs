//! Configuration module for Tunnelpool
//!
//! This module provides configuration types and parsing for pools.

mod pool;
mod transport;

pub use pool::{join_host_port, ExhaustionPolicy, PoolConfig};
pub use transport::{ProxyConfig, TcpConfig};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Root configuration structure
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Pool configuration
    pub pool: PoolConfig,
}

/// Load configuration from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = std::fs::read_to_string(path.as_ref())
        .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

    parse_config(&content)
}

/// Parse configuration from a TOML string
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse configuration")?;
    config
        .pool
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid pool configuration: {}", e))?;
    Ok(config)
}
