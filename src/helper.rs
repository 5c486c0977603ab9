//! Helper utilities for Tunnelpool
//!
//! This module provides common constants and IO helpers.

use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Default buffer size for IO operations
pub const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Upper bound on a graceful shutdown before a socket is dropped
pub const CLOSE_TIMEOUT: Duration = Duration::from_millis(100);

/// Pump bytes between a tunnel and a local reader/writer pair.
///
/// Local EOF half-closes the tunnel; the call returns once the remote side
/// has finished sending. Returns `(sent, received)` byte counts.
pub async fn relay<S, R, W>(stream: &mut S, local_in: &mut R, local_out: &mut W) -> std::io::Result<(u64, u64)>
where
    S: AsyncRead + AsyncWrite + Unpin + ?Sized,
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let (mut remote_rd, mut remote_wr) = tokio::io::split(stream);

    let upstream = async {
        let sent = tokio::io::copy(local_in, &mut remote_wr).await?;
        remote_wr.shutdown().await?;
        Ok::<_, std::io::Error>(sent)
    };
    let downstream = async {
        let mut received = 0u64;
        let mut buf = vec![0u8; DEFAULT_BUFFER_SIZE];
        loop {
            let n = remote_rd.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            local_out.write_all(&buf[..n]).await?;
            local_out.flush().await?;
            received += n as u64;
        }
        Ok::<_, std::io::Error>(received)
    };

    tokio::try_join!(upstream, downstream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[test]
    fn test_constants() {
        assert_eq!(DEFAULT_BUFFER_SIZE, 8192);
        assert_eq!(CLOSE_TIMEOUT, Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_relay() {
        let (mut tunnel, mut remote) = duplex(1024);
        let mut local_in: &[u8] = b"hello";
        let mut local_out = Vec::new();

        let remote_task = tokio::spawn(async move {
            let mut buf = [0u8; 5];
            remote.read_exact(&mut buf).await.unwrap();
            assert_eq!(&buf, b"hello");
            remote.write_all(b"world").await.unwrap();
        });

        let (sent, received) = relay(&mut tunnel, &mut local_in, &mut local_out)
            .await
            .unwrap();
        remote_task.await.unwrap();

        assert_eq!(sent, 5);
        assert_eq!(received, 5);
        assert_eq!(local_out, b"world");
    }
}
