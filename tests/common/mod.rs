//! Test utilities and mocks for Tunnelpool
//!
//! A scriptable fake proxy bound to an ephemeral port, and a transport
//! wrapper that counts connects and bytes sent.

#![allow(dead_code)]

use async_trait::async_trait;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tunnelpool::config::PoolConfig;
use tunnelpool::transport::{Endpoint, Liveness, TcpTransport, Transport};

/// A local TCP server whose per-connection behavior is scripted
pub struct FakeProxy {
    pub addr: SocketAddr,
    accepted: Arc<AtomicUsize>,
    task: JoinHandle<()>,
}

impl FakeProxy {
    /// Bind to an ephemeral port and run `handler` for every connection
    pub async fn start<F, Fut>(handler: F) -> Self
    where
        F: Fn(TcpStream) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepted = Arc::new(AtomicUsize::new(0));

        let counter = accepted.clone();
        let task = tokio::spawn(async move {
            while let Ok((sock, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(handler(sock));
            }
        });

        FakeProxy {
            addr,
            accepted,
            task,
        }
    }

    /// Connections accepted so far
    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    /// Pool configuration tunneling to `test:443` through this proxy
    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            network_timeout: 0.5,
            connect_timeout: 1.0,
            acquire_timeout: 0.3,
            probe_timeout_ms: 10,
            ..PoolConfig::proxied("127.0.0.1", self.addr.port(), "test", 443)
        }
    }
}

impl Drop for FakeProxy {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Read a request head, up to and including the empty line
pub async fn read_request(sock: &mut TcpStream) -> io::Result<Vec<u8>> {
    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        if sock.read(&mut byte).await? == 0 {
            break;
        }
        head.push(byte[0]);
    }
    Ok(head)
}

/// Wait until the client side closes, returning whether it did in time
pub async fn wait_for_close(sock: &mut TcpStream, timeout: Duration) -> bool {
    let mut buf = [0u8; 256];
    let closed = async {
        loop {
            match sock.read(&mut buf).await {
                Ok(0) | Err(_) => return,
                Ok(_) => continue,
            }
        }
    };
    tokio::time::timeout(timeout, closed).await.is_ok()
}

/// Proxy that reads the CONNECT, answers `response`, then echoes
pub async fn start_tunneling_proxy(response: &'static [u8]) -> FakeProxy {
    FakeProxy::start(move |mut sock| async move {
        if read_request(&mut sock).await.is_err() {
            return;
        }
        if sock.write_all(response).await.is_err() {
            return;
        }
        let (mut rd, mut wr) = sock.split();
        let _ = tokio::io::copy(&mut rd, &mut wr).await;
    })
    .await
}

/// Stream wrapper counting bytes written
#[derive(Debug)]
pub struct CountingStream {
    inner: TcpStream,
    sent: Arc<AtomicUsize>,
}

impl AsyncRead for CountingStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_read(cx, buf)
    }
}

impl AsyncWrite for CountingStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        let poll = Pin::new(&mut this.inner).poll_write(cx, buf);
        if let Poll::Ready(Ok(n)) = &poll {
            this.sent.fetch_add(*n, Ordering::SeqCst);
        }
        poll
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}

/// TCP transport that counts connects and bytes sent
#[derive(Debug)]
pub struct CountingTransport {
    inner: TcpTransport,
    connects: AtomicUsize,
    sent: Arc<AtomicUsize>,
}

impl CountingTransport {
    pub fn new() -> Self {
        CountingTransport {
            inner: TcpTransport::with_defaults(),
            connects: AtomicUsize::new(0),
            sent: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn bytes_sent(&self) -> usize {
        self.sent.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for CountingTransport {
    type Stream = CountingStream;

    async fn connect(&self, endpoint: &Endpoint, timeout: Duration) -> anyhow::Result<Self::Stream> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let inner = self.inner.connect(endpoint, timeout).await?;
        Ok(CountingStream {
            inner,
            sent: self.sent.clone(),
        })
    }

    async fn probe(&self, conn: &Self::Stream, timeout: Duration) -> Liveness {
        self.inner.probe(&conn.inner, timeout).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fake_proxy_counts_connections() {
        let proxy = FakeProxy::start(|_sock| async {}).await;
        assert_eq!(proxy.accepted(), 0);

        let _conn = TcpStream::connect(proxy.addr).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(proxy.accepted(), 1);
    }

    #[tokio::test]
    async fn test_read_request() {
        let proxy = FakeProxy::start(|mut sock| async move {
            let head = read_request(&mut sock).await.unwrap();
            sock.write_all(&head).await.unwrap();
        })
        .await;

        let mut conn = TcpStream::connect(proxy.addr).await.unwrap();
        conn.write_all(b"CONNECT a:1 HTTP/1.1\r\n\r\nextra").await.unwrap();

        let mut buf = vec![0u8; 64];
        let n = conn.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"CONNECT a:1 HTTP/1.1\r\n\r\n");
    }
}
