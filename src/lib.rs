//! # Tunnelpool - Socket Pool with HTTP CONNECT Tunneling
//!
//! Tunnelpool hands HTTP client code a ready-to-use socket to a target host.
//! It reuses idle sockets when it can and, when a forward proxy is
//! configured, transparently performs the `CONNECT` handshake so the caller
//! gets a raw pipe to the target.
//!
//! ## Features
//!
//! - **Bounded Pooling**: At most `max_size` sockets checked out per pool
//! - **Transparent Tunneling**: CONNECT handshake with strict response classification
//! - **Validation**: Idle sockets are probed for liveness before reuse
//! - **Discriminated Failures**: Connect, proxy, exhaustion and teardown errors
//!
//! ## Usage
//!
//! ```rust,no_run
//! use tunnelpool::config::PoolConfig;
//! use tunnelpool::pool::ConnectionPool;
//! use tokio::io::AsyncWriteExt;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = PoolConfig::proxied("127.0.0.1", 3128, "example.com", 443);
//!     let pool = ConnectionPool::from_config(config)?;
//!
//!     let mut socket = pool.acquire().await?;
//!     socket.write_all(b"...").await?;
//!     pool.release(socket, true).await?;
//!
//!     pool.close_all().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! acquire -> idle socket valid? -> yes -> hand out
//!                               -> no  -> dial proxy -> CONNECT host:port -> hand out
//! release -> reusable and valid? -> idle / close
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod config;
pub mod error;
pub mod helper;
pub mod pool;
pub mod proxy;
pub mod transport;

// Re-export commonly used items
pub use config::{load_config, Config, PoolConfig};
pub use error::{PoolError, ProxyError};
pub use pool::{ConnectionPool, PooledSocket};

/// Version of the Tunnelpool library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Name of the application
pub const NAME: &str = env!("CARGO_PKG_NAME");
