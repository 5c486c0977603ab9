//! CONNECT request encoding

use crate::config::join_host_port;
use bytes::{BufMut, Bytes, BytesMut};
use tracing::warn;

/// An HTTP `CONNECT` request for one target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    authority: String,
    headers: Vec<(String, String)>,
}

impl ConnectRequest {
    /// Create a request tunneling to `host:port`
    pub fn new(host: &str, port: u16) -> Self {
        ConnectRequest {
            authority: join_host_port(host, port),
            headers: Vec::new(),
        }
    }

    /// Add a header sent after `Host`
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Add several headers
    pub fn with_headers<I>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.headers.extend(headers);
        self
    }

    /// The `host:port` the proxy is asked to connect to
    pub fn authority(&self) -> &str {
        &self.authority
    }

    /// Serialize the request head
    ///
    /// Headers whose name or value would break the framing are skipped.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(64 + self.authority.len() * 2);
        buf.put_slice(b"CONNECT ");
        buf.put_slice(self.authority.as_bytes());
        buf.put_slice(b" HTTP/1.1\r\nHost: ");
        buf.put_slice(self.authority.as_bytes());
        buf.put_slice(b"\r\n");

        for (name, value) in &self.headers {
            if !is_safe_header(name, value) {
                warn!("Skipping CONNECT header {:?} with invalid characters", name);
                continue;
            }
            buf.put_slice(name.as_bytes());
            buf.put_slice(b": ");
            buf.put_slice(value.as_bytes());
            buf.put_slice(b"\r\n");
        }

        buf.put_slice(b"\r\n");
        buf.freeze()
    }
}

fn is_safe_header(name: &str, value: &str) -> bool {
    !name.is_empty()
        && !name.contains(|c: char| c == ':' || c.is_whitespace() || c.is_control())
        && !value.contains(['\r', '\n'])
}
