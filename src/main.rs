//! Tunnelpool - open a (possibly proxied) connection from the command line
//!
//! Acquires one socket from a pool and either reports success (`--check`)
//! or relays stdin/stdout through it.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;
use tunnelpool::config::{load_config, PoolConfig};
use tunnelpool::helper::relay;
use tunnelpool::pool::ConnectionPool;
use url::Url;

/// Tunnelpool - connect to a host, optionally through an HTTP CONNECT proxy
#[derive(Parser, Debug)]
#[command(name = "tunnelpool")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Target as host:port (overrides request_host/request_port)
    #[arg(short, long)]
    target: Option<String>,

    /// Proxy URL, e.g. http://proxy:3128 (enables use_proxy)
    #[arg(short, long)]
    proxy: Option<String>,

    /// Only establish the connection, then exit
    #[arg(long)]
    check: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Enable JSON logging format
    #[arg(long)]
    json_log: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logging
    setup_logging(&args.log_level, args.json_log)?;

    let config = build_config(&args)?;
    info!("Tunnelpool v{}", tunnelpool::VERSION);

    let pool = ConnectionPool::from_config(config)?;
    let mut socket = pool.acquire().await?;
    info!("Connected to {} via {}", pool.key(), pool.config().endpoint());

    if args.check {
        pool.release(socket, false).await?;
    } else {
        let mut stdin = tokio::io::stdin();
        let mut stdout = tokio::io::stdout();
        let (sent, received) = relay(&mut socket, &mut stdin, &mut stdout).await?;
        info!("Relay finished: {} bytes sent, {} bytes received", sent, received);
        pool.release(socket, false).await?;
    }

    pool.log_health();
    pool.close_all().await;
    Ok(())
}

/// Merge the config file with command line overrides
fn build_config(args: &Args) -> Result<PoolConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let config = load_config(path)?.pool;
            info!("Configuration loaded from: {:?}", path);
            config
        }
        None => PoolConfig::default(),
    };

    if let Some(target) = &args.target {
        let (host, port) = parse_target(target)?;
        config.request_host = host;
        config.request_port = port;
    }

    if let Some(proxy) = &args.proxy {
        let url = Url::parse(proxy).with_context(|| format!("Invalid proxy URL: {}", proxy))?;
        if url.scheme() != "http" {
            anyhow::bail!("Unsupported proxy scheme: {}", url.scheme());
        }
        config.proxy_host = url
            .host_str()
            .context("Proxy URL has no host")?
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_string();
        config.proxy_port = url.port_or_known_default().unwrap_or(80);
        config.use_proxy = true;
    }

    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;
    Ok(config)
}

/// Split `host:port`, accepting bracketed IPv6 hosts
fn parse_target(target: &str) -> Result<(String, u16)> {
    let (host, port) = target
        .rsplit_once(':')
        .with_context(|| format!("Target must be host:port: {}", target))?;
    let port = port
        .parse::<u16>()
        .with_context(|| format!("Invalid port in target: {}", target))?;
    let host = host.trim_start_matches('[').trim_end_matches(']');
    if host.is_empty() {
        anyhow::bail!("Target must be host:port: {}", target);
    }
    Ok((host.to_string(), port))
}

/// Setup logging based on configuration
fn setup_logging(level: &str, json: bool) -> Result<()> {
    let level = match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // Logs go to stderr; stdout carries relayed data
    if json {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(level)
            .with_writer(std::io::stderr)
            .json()
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(level)
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    }

    Ok(())
}
